//! Merge de parámetros JSON.
//!
//! Merge "shallow": las claves de `b` reemplazan a las de `a`. Para objetos
//! anidados no se desciende; la semántica se mantiene simple y predecible.

use serde_json::Value;

/// Cuando alguno de los dos valores no es objeto, `b` tiene precedencia
/// salvo que sea `null`.
pub fn merge_json(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let mut out = ma.clone();
            for (k, v) in mb.iter() {
                out.insert(k.clone(), v.clone());
            }
            Value::Object(out)
        }
        (_, Value::Null) => a.clone(),
        (_, other) => other.clone(),
    }
}
