//! Spreadsheet-facing operations: the `GPT` custom function and the settings actions
//! behind the add-on menu.

pub mod functions;

pub use functions::{error_properties, GptOptions, SheetFunctions, RESULT_CACHE_TTL};
