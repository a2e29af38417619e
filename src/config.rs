use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::charts::{ChartOptions, LabelMode};
use crate::height::HeightConfig;
use crate::layout::LayoutConfig;
use crate::packer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub layout: LayoutSettings,
    pub charts: ChartSettings,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            layout: LayoutSettings::from_env(),
            charts: ChartSettings::from_env(),
            session: SessionConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "BLOCKVIZ_API_HOST";
    const PORT_VAR: &'static str = "BLOCKVIZ_API_PORT";

    fn from_env() -> Self {
        let (bind_ip, display_host) = match env_string(Self::HOST_VAR) {
            Some(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => (ip, raw),
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::HOST_VAR,
                        raw,
                        err,
                        Self::DEFAULT_HOST
                    );
                    (Self::default_ip(), Self::DEFAULT_HOST.to_string())
                }
            },
            None => (Self::default_ip(), Self::DEFAULT_HOST.to_string()),
        };

        let port = parse_with_warning(
            Self::PORT_VAR,
            env_string(Self::PORT_VAR),
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    fn default_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: Self::default_ip(),
            display_host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

/// Scene layout parameters.
#[derive(Clone, Debug, Default)]
pub struct LayoutSettings {
    layout: LayoutConfig,
}

impl LayoutSettings {
    const SCALE_VAR: &'static str = "BLOCKVIZ_LAYOUT_SCALE";
    const GAP_RATIO_VAR: &'static str = "BLOCKVIZ_LAYOUT_GAP_RATIO";
    const RATE_PER_DAY_VAR: &'static str = "BLOCKVIZ_LAYOUT_RATE_PER_DAY";
    const MIN_HEIGHT_VAR: &'static str = "BLOCKVIZ_LAYOUT_MIN_HEIGHT";
    const FIXED_LANES_VAR: &'static str = "BLOCKVIZ_LAYOUT_FIXED_LANES";

    fn from_env() -> Self {
        let scale = load_f64_with_warning(
            Self::SCALE_VAR,
            PackingConfig::DEFAULT_SCALE,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted scale changes every box size and lane offset",
        );

        let gap_ratio = load_f64_with_warning(
            Self::GAP_RATIO_VAR,
            PackingConfig::DEFAULT_GAP_RATIO,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted gap ratio changes block spacing",
        );

        let rate_per_day = load_f64_with_warning(
            Self::RATE_PER_DAY_VAR,
            HeightConfig::DEFAULT_RATE_PER_DAY,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted height rate changes the schedule time axis",
        );

        let min_height = load_f64_with_warning(
            Self::MIN_HEIGHT_VAR,
            HeightConfig::DEFAULT_MIN_HEIGHT,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted minimum height changes not-yet-started boxes",
        );

        let fixed_lanes = parse_with_warning(
            Self::FIXED_LANES_VAR,
            env_string(Self::FIXED_LANES_VAR),
            LayoutConfig::default().fixed_lanes,
            |value: usize| value >= 1,
            "must be at least 1",
        );

        let layout = LayoutConfig {
            packing: PackingConfig::builder()
                .scale(scale)
                .gap_ratio(gap_ratio)
                .build(),
            height: HeightConfig::builder()
                .rate_per_day(rate_per_day)
                .min_height(min_height)
                .build(),
            fixed_lanes,
            ..LayoutConfig::default()
        };

        Self { layout }
    }

    /// Returns the configured LayoutConfig.
    pub fn layout_config(&self) -> LayoutConfig {
        self.layout
    }
}

/// Default chart options, overridable per request.
#[derive(Clone, Debug, Default)]
pub struct ChartSettings {
    options: ChartOptions,
}

impl ChartSettings {
    const THRESHOLD_VAR: &'static str = "BLOCKVIZ_CHART_SMALL_SLICE_THRESHOLD";
    const MAX_SLICES_VAR: &'static str = "BLOCKVIZ_CHART_MAX_SLICES";
    const TOP_N_VAR: &'static str = "BLOCKVIZ_CHART_TOP_N";
    const INNER_DIAMETER_VAR: &'static str = "BLOCKVIZ_CHART_INNER_DIAMETER";
    const LABEL_MODE_VAR: &'static str = "BLOCKVIZ_CHART_LABEL_MODE";
    const USE_BAR_VAR: &'static str = "BLOCKVIZ_CHART_USE_BAR";

    fn from_env() -> Self {
        let small_slice_threshold = load_f64_with_warning(
            Self::THRESHOLD_VAR,
            ChartOptions::DEFAULT_SMALL_SLICE_THRESHOLD,
            |value| (0.0..1.0).contains(&value),
            "must be in [0, 1)",
            "Adjusted threshold changes which slices fold into Other",
        );

        let max_slices = parse_with_warning(
            Self::MAX_SLICES_VAR,
            env_string(Self::MAX_SLICES_VAR),
            ChartOptions::DEFAULT_MAX_SLICES,
            |value: usize| value >= 1,
            "must be at least 1",
        );

        let top_n = parse_with_warning(
            Self::TOP_N_VAR,
            env_string(Self::TOP_N_VAR),
            ChartOptions::DEFAULT_TOP_N,
            |_: usize| true,
            "must be a non-negative integer",
        );

        let inner_diameter = load_f64_with_warning(
            Self::INNER_DIAMETER_VAR,
            ChartOptions::DEFAULT_INNER_DIAMETER,
            |value| (0.0..1.0).contains(&value),
            "must be in [0, 1)",
            "Adjusted donut hole size",
        );

        let label_mode = env_string(Self::LABEL_MODE_VAR)
            .and_then(|raw| parse_label_mode(&raw, Self::LABEL_MODE_VAR))
            .unwrap_or_default();

        let use_bar_chart = env_string(Self::USE_BAR_VAR)
            .and_then(|raw| parse_bool(&raw, Self::USE_BAR_VAR))
            .unwrap_or(false);

        Self {
            options: ChartOptions {
                small_slice_threshold,
                max_slices,
                top_n,
                label_mode,
                use_bar_chart,
                inner_diameter,
            },
        }
    }

    /// Returns the default ChartOptions.
    pub fn chart_options(&self) -> ChartOptions {
        self.options.clone()
    }
}

/// Configuration for the chart session task.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    debounce: Duration,
}

impl SessionConfig {
    const DEFAULT_DEBOUNCE_MS: u64 = 100;
    const DEBOUNCE_VAR: &'static str = "BLOCKVIZ_SESSION_DEBOUNCE_MS";

    fn from_env() -> Self {
        let millis = parse_with_warning(
            Self::DEBOUNCE_VAR,
            env_string(Self::DEBOUNCE_VAR),
            Self::DEFAULT_DEBOUNCE_MS,
            |value| value > 0,
            "must be greater than 0",
        );
        Self {
            debounce: Duration::from_millis(millis),
        }
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self { debounce }
    }

    /// Quiet period after the last change before charts are recomputed.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::with_debounce(Duration::from_millis(Self::DEFAULT_DEBOUNCE_MS))
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn parse_label_mode(raw: &str, var_name: &str) -> Option<LabelMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "percent" | "percent_only" | "percentonly" => Some(LabelMode::PercentOnly),
        "off" | "none" => Some(LabelMode::Off),
        other => {
            warn!(
                "Could not interpret {} ('{}') as label mode (percent/off). Using default value.",
                var_name, other
            );
            None
        }
    }
}

/// Parses `raw`, falling back to `default` when absent, unparsable or
/// rejected by `validator`.
fn parse_with_warning<T>(
    var_name: &str,
    raw: Option<String>,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if validator(value) => value,
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    resolve_f64(
        var_name,
        env_string(var_name),
        default,
        validator,
        invalid_hint,
        notice,
    )
}

fn resolve_f64(
    var_name: &str,
    raw: Option<String>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    let value = parse_with_warning(
        var_name,
        raw,
        default,
        |value: f64| value.is_finite() && validator(value),
        invalid_hint,
    );
    let tolerance = (default.abs().max(1.0)) * 1e-9;
    if (value - default).abs() > tolerance {
        info!("{} ({} = {}).", notice, var_name, value);
    }
    value
}
