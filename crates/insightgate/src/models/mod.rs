pub mod failure;
pub mod statement;
pub mod tool_result;

pub use failure::{
    EXECUTION_FAILURE_MESSAGE, FailureKind, GatewayError, ValidationFailure, ViolationReason,
};
pub use statement::{Statement, json_value_from_sql, sql_value_from_json};
pub use tool_result::{ToolResult, ToolResultFailure};
