//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Iteration controller constants
pub mod iteration {
    /// Default maximum judge-and-retry passes per metric
    pub const MAX_ITERATIONS: u32 = 5;

    /// Upper bound accepted for a configured iteration cap
    pub const ITERATION_CAP_LIMIT: u32 = 50;

    /// Default confidence the judge must reach for early acceptance
    pub const CONFIDENCE_THRESHOLD: f32 = 0.8;
}

/// Quality judge constants
pub mod judge {
    /// Characters of raw agent output included in the judge prompt
    pub const RAW_PREVIEW_CHARS: usize = 2000;

    /// Feedback prefix for synthesized rejections
    pub const FAILURE_FEEDBACK_PREFIX: &str = "Judge evaluation failed";

    /// Suggestion attached to synthesized rejections
    pub const FAILURE_SUGGESTION: &str = "Retry with original approach";

    /// Default judge request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
}

/// Analysis agent constants
pub mod agent {
    /// Reasoning steps the agent may take per query
    pub const MAX_STEPS: u32 = 30;

    /// Default agent call timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    /// MCP tool invoked for analytic queries
    pub const DEFAULT_TOOL_NAME: &str = "analyze";

    /// MCP protocol revision sent during initialize
    pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

    /// Header carrying the MCP session identifier
    pub const MCP_SESSION_HEADER: &str = "Mcp-Session-Id";
}

/// Chart rendering constants
pub mod chart {
    /// Default figure width (inches)
    pub const WIDTH_INCHES: f32 = 12.0;

    /// Default figure height (inches)
    pub const HEIGHT_INCHES: f32 = 4.0;

    /// Default resolution
    pub const DPI: u32 = 150;

    /// Fraction of a category slot occupied by its bars
    pub const GROUP_WIDTH: f32 = 0.8;

    /// Absolute headroom added above the tallest value
    pub const Y_HEADROOM: f64 = 10.0;

    /// Number of horizontal grid lines
    pub const GRID_LINES: u32 = 5;

    /// Series colours, assigned in sorted sub-label order
    pub const PALETTE: [&str; 10] = [
        "#8ad3f4", "#d896f6", "#f7a463", "#f15375", "#b7b8f5", "#f6b8ea", "#469acf", "#ffd700",
        "#b0e0e6", "#ffa07a",
    ];
}

/// Google Drive / Slides constants
pub mod google {
    pub const SLIDES_API_BASE: &str = "https://slides.googleapis.com/v1";
    pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
    pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
    pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

    /// OAuth scopes requested for the service account
    pub const SCOPES: &str =
        "https://www.googleapis.com/auth/presentations https://www.googleapis.com/auth/drive";

    /// Public image URL template; `{id}` is replaced by the Drive file id
    pub const PUBLIC_IMAGE_URL: &str = "https://drive.google.com/uc?export=view&id={id}";

    /// Prefix of the copied presentation name
    pub const PRESENTATION_PREFIX: &str = "final_presentation";

    /// Maximum slug length in template tokens
    pub const SLUG_MAX_LEN: usize = 40;

    /// Refresh the access token this many seconds before it expires
    pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

    /// Lifetime requested for service-account assertions (seconds)
    pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

    /// Retries for transient API failures
    pub const MAX_RETRIES: usize = 3;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}
