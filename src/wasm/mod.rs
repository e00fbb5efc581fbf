//! Browser boundary (enabled with the `wasm` feature).

use crate::errors::{GenerationError, GenerationResult};
use serde_json::Value as JsonValue;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

pub mod generator_js;

// Optional: better panic messages in the browser console.
#[cfg(feature = "console_error_panic_hook")]
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Serialize an arbitrary JS object to a JSON document.
fn js_object_to_json(value: JsValue) -> GenerationResult<String> {
    if value.is_undefined() || value.is_null() {
        return Ok("{}".to_string());
    }

    let json: JsonValue = from_value(value).map_err(|e| {
        GenerationError::InvalidConfig(format!("failed to read parameters from JS: {e:?}"))
    })?;

    serde_json::to_string(&json).map_err(|e| {
        GenerationError::InvalidConfig(format!("failed to stringify parameters: {e}"))
    })
}
