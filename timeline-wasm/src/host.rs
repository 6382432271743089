//! [`TableSource`] backed by the host SDK's JavaScript objects.

use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use serde_wasm_bindgen::{from_value, to_value};
use timeline_bitable::{FieldValue, PageRequest, RecordIdPage, SourceError, TableSource};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

/// Wraps the SDK `base` object (`getTable`) and the table objects it hands
/// out (`getRecordIdListByPage`, `getCellValue`).
#[derive(Debug, Clone)]
pub struct JsTableSource {
    base: JsValue,
}

impl JsTableSource {
    pub fn new(base: JsValue) -> Self {
        Self { base }
    }
}

#[async_trait(?Send)]
impl TableSource for JsTableSource {
    type Table = JsValue;

    async fn resolve_table(&self, table_id: &str) -> Result<JsValue, SourceError> {
        call_async(&self.base, "getTable", &[JsValue::from_str(table_id)])
            .await
            .map_err(|err| {
                warn!(%table_id, error = %describe(&err), "getTable rejected");
                SourceError::TableNotFound(table_id.to_string())
            })
    }

    async fn list_record_ids(
        &self,
        table: &JsValue,
        request: PageRequest,
    ) -> Result<RecordIdPage, SourceError> {
        let arg = to_value(&request).map_err(|err| SourceError::Host(err.to_string()))?;
        let page = call_async(table, "getRecordIdListByPage", &[arg])
            .await
            .map_err(host_error)?;
        from_value(page).map_err(|err| SourceError::Host(format!("malformed record page: {err}")))
    }

    async fn get_field_value(
        &self,
        table: &JsValue,
        field_id: &str,
        record_id: &str,
    ) -> Result<Option<FieldValue>, SourceError> {
        let value = call_async(
            table,
            "getCellValue",
            &[JsValue::from_str(field_id), JsValue::from_str(record_id)],
        )
        .await
        .map_err(host_error)?;

        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        match from_value(value) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(%field_id, %record_id, error = %err, "unsupported cell value");
                Ok(None)
            }
        }
    }
}

/// Invoke `target[method](...args)` and await the result, which may or may
/// not be a promise.
async fn call_async(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let function: Function = Reflect::get(target, &JsValue::from_str(method))?.dyn_into()?;
    let returned = function.apply(target, &args.iter().collect::<Array>())?;
    JsFuture::from(Promise::resolve(&returned)).await
}

fn host_error(err: JsValue) -> SourceError {
    SourceError::Host(describe(&err))
}

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// Resolve after `delay` using the window timer, or right away without one.
pub async fn sleep(delay: Duration) {
    let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
    let promise = Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}
