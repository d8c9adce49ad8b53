//! 工具参数 JSON Schema 生成（schemars）
//!
//! 远端 function 定义只接受普通 JSON Schema 对象，去掉 schemars 附带的 `$schema` 与 `title`；
//! 顶层 `description` 来自参数结构体的文档注释，工具说明已在 function.description 中给出，一并去掉。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回类型 T 的参数 schema，可直接作为 function.parameters
pub fn parameters_schema_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("description");
    }
    value
}
