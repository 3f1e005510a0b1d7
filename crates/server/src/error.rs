//! Errors raised while turning tool input into proxy calls.

use offgrid_client::UrlError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A parameter could not be used as given.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The request URL could not be resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] UrlError),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        McpError { code: ErrorCode(-32602), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_to_mcp_error() {
        let err: McpError = ToolError::InvalidUrl(UrlError::Empty).into();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.message, "INVALID_URL: empty URL");
    }

    #[test]
    fn test_invalid_input_display() {
        let err = ToolError::InvalidInput("method must not be empty".into());
        assert_eq!(err.to_string(), "INVALID_INPUT: method must not be empty");
    }
}
