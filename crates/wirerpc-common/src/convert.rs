//! JSON ⇄ native type conversions.
//!
//! Every native type usable as a handler parameter or return value provides
//! a [`FromJson`]/[`ToJson`] pair. Conversions are strict: integers reject
//! floats and strings, booleans reject everything but booleans, and so on;
//! only floating point widens from the integer variants. Domain types
//! extend the fabric by implementing the same pair.
//!
//! On top of the per-type conversions sit the arity-checked tuple traits:
//! [`FromParams`] extracts a handler's positional parameters from a JSON
//! `params` value, and [`IntoParams`] packs native arguments into a params
//! array on the client side.

use std::collections::HashMap;

use serde_json::Value;

use crate::protocol::error::RpcError;

/// Conversion from a native value into JSON. Total.
pub trait ToJson {
    fn to_json(&self) -> Value;
}

/// Conversion from JSON into a native value.
///
/// Fails with `InvalidParams` on a type mismatch.
pub trait FromJson: Sized {
    fn from_json(value: &Value) -> Result<Self, RpcError>;
}

/// JSON type name used in mismatch diagnostics.
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &str, value: &Value) -> RpcError {
    RpcError::invalid_params(format!("expected {}, got {}", expected, json_type(value)))
}

impl ToJson for i32 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for i32 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| mismatch("i32", value))
    }
}

impl ToJson for i64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for i64 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl ToJson for u64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for u64 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_u64().ok_or_else(|| mismatch("u64", value))
    }
}

impl ToJson for f64 {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

// Floating point widens from any numeric variant.
impl FromJson for f64 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_f64().ok_or_else(|| mismatch("number", value))
    }
}

impl ToJson for f32 {
    fn to_json(&self) -> Value {
        Value::from(f64::from(*self))
    }
}

impl FromJson for f32 {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        f64::from_json(value).map(|n| n as f32)
    }
}

impl ToJson for bool {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for bool {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl ToJson for String {
    fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

impl ToJson for &str {
    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl FromJson for String {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl<T: ToJson> ToJson for Vec<T> {
    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(ToJson::to_json).collect())
    }
}

impl<T: FromJson> FromJson for Vec<T> {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let elements = value.as_array().ok_or_else(|| mismatch("array", value))?;
        elements
            .iter()
            .enumerate()
            .map(|(index, element)| {
                T::from_json(element).map_err(|e| {
                    RpcError::invalid_params(format!(
                        "array element {}: {}",
                        index,
                        e.message()
                    ))
                })
            })
            .collect()
    }
}

impl<T: ToJson> ToJson for HashMap<String, T> {
    fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl<T: FromJson> FromJson for HashMap<String, T> {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        let entries = value.as_object().ok_or_else(|| mismatch("object", value))?;
        entries
            .iter()
            .map(|(key, element)| {
                T::from_json(element)
                    .map(|converted| (key.clone(), converted))
                    .map_err(|e| {
                        RpcError::invalid_params(format!("object member {:?}: {}", key, e.message()))
                    })
            })
            .collect()
    }
}

impl ToJson for Value {
    fn to_json(&self) -> Value {
        self.clone()
    }
}

impl FromJson for Value {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        Ok(value.clone())
    }
}

// Void: handlers without a return value serialize to null.
impl ToJson for () {
    fn to_json(&self) -> Value {
        Value::Null
    }
}

impl FromJson for () {
    fn from_json(value: &Value) -> Result<Self, RpcError> {
        match value {
            Value::Null => Ok(()),
            other => Err(mismatch("null", other)),
        }
    }
}

/// Lifts a handler's native return value into a JSON result.
///
/// Implemented both for plain `ToJson` values and for
/// `Result<T, RpcError>`, so handlers can raise typed errors. The `Marker`
/// parameter only disambiguates the two families for trait resolution.
pub trait IntoRpcResult<Marker> {
    fn into_rpc_result(self) -> Result<Value, RpcError>;
}

/// Marker for infallible handler returns.
pub enum ValueReturn {}

/// Marker for `Result` handler returns.
pub enum FallibleReturn {}

impl<T: ToJson> IntoRpcResult<ValueReturn> for T {
    fn into_rpc_result(self) -> Result<Value, RpcError> {
        Ok(self.to_json())
    }
}

impl<T: ToJson> IntoRpcResult<FallibleReturn> for Result<T, RpcError> {
    fn into_rpc_result(self) -> Result<Value, RpcError> {
        self.map(|value| value.to_json())
    }
}

/// Packs native arguments into a JSON-RPC `params` value (client side).
///
/// Implemented for tuples of [`ToJson`] values up to arity 8 and for a raw
/// `Vec<Value>`. The empty tuple produces `null`.
pub trait IntoParams {
    fn into_params(self) -> Value;
}

impl IntoParams for Vec<Value> {
    fn into_params(self) -> Value {
        Value::Array(self)
    }
}

impl IntoParams for () {
    fn into_params(self) -> Value {
        Value::Null
    }
}

macro_rules! impl_into_params {
    ($($ty:ident : $idx:tt),+) => {
        impl<$($ty: ToJson),+> IntoParams for ($($ty,)+) {
            fn into_params(self) -> Value {
                Value::Array(vec![$(self.$idx.to_json()),+])
            }
        }
    };
}

impl_into_params!(A0: 0);
impl_into_params!(A0: 0, A1: 1);
impl_into_params!(A0: 0, A1: 1, A2: 2);
impl_into_params!(A0: 0, A1: 1, A2: 2, A3: 3);
impl_into_params!(A0: 0, A1: 1, A2: 2, A3: 3, A4: 4);
impl_into_params!(A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5);
impl_into_params!(A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5, A6: 6);
impl_into_params!(A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5, A6: 6, A7: 7);

/// Extracts a handler's positional parameters from a JSON `params` value.
///
/// The arity check happens before any element conversion: `params` must be
/// an array of exactly `ARITY` elements (for arity zero, null or an empty
/// array). Object-valued params are accepted on the wire but rejected here,
/// since registered handlers are positional.
pub trait FromParams: Sized {
    const ARITY: usize;

    fn from_params(params: &Value) -> Result<Self, RpcError>;
}

impl FromParams for () {
    const ARITY: usize = 0;

    fn from_params(params: &Value) -> Result<Self, RpcError> {
        match params {
            Value::Null => Ok(()),
            Value::Array(args) if args.is_empty() => Ok(()),
            Value::Array(args) => Err(RpcError::invalid_params(format!(
                "expected no parameters, got {}",
                args.len()
            ))),
            Value::Object(_) => Err(RpcError::invalid_params(
                "named parameters are not supported by positional handlers",
            )),
            other => Err(mismatch("null or an empty array", other)),
        }
    }
}

macro_rules! impl_from_params {
    ($len:expr; $($ty:ident : $idx:tt),+) => {
        impl<$($ty: FromJson),+> FromParams for ($($ty,)+) {
            const ARITY: usize = $len;

            fn from_params(params: &Value) -> Result<Self, RpcError> {
                let args = match params {
                    Value::Array(args) => args,
                    Value::Object(_) => {
                        return Err(RpcError::invalid_params(
                            "named parameters are not supported by positional handlers",
                        ))
                    }
                    other => return Err(mismatch("a params array", other)),
                };
                if args.len() != $len {
                    return Err(RpcError::invalid_params(format!(
                        "expected {} parameters, got {}",
                        $len,
                        args.len()
                    )));
                }
                Ok(($(
                    $ty::from_json(&args[$idx]).map_err(|e| {
                        RpcError::invalid_params(format!("parameter {}: {}", $idx, e.message()))
                    })?,
                )+))
            }
        }
    };
}

impl_from_params!(1; A0: 0);
impl_from_params!(2; A0: 0, A1: 1);
impl_from_params!(3; A0: 0, A1: 1, A2: 2);
impl_from_params!(4; A0: 0, A1: 1, A2: 2, A3: 3);
impl_from_params!(5; A0: 0, A1: 1, A2: 2, A3: 3, A4: 4);
impl_from_params!(6; A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5);
impl_from_params!(7; A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5, A6: 6);
impl_from_params!(8; A0: 0, A1: 1, A2: 2, A3: 3, A4: 4, A5: 5, A6: 6, A7: 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_i32_accepts_only_fitting_integers() {
        assert_eq!(i32::from_json(&json!(42)).unwrap(), 42);
        assert_eq!(i32::from_json(&json!(-7)).unwrap(), -7);
        assert!(i32::from_json(&json!(3.5)).is_err());
        assert!(i32::from_json(&json!("42")).is_err());
        assert!(i32::from_json(&json!(i64::from(i32::MAX) + 1)).is_err());
    }

    #[test]
    fn test_i64_rejects_floats_and_huge_unsigned() {
        assert_eq!(i64::from_json(&json!(1_i64 << 40)).unwrap(), 1 << 40);
        assert!(i64::from_json(&json!(1.0)).is_err());
        assert!(i64::from_json(&json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_u64_rejects_negative() {
        assert_eq!(u64::from_json(&json!(u64::MAX)).unwrap(), u64::MAX);
        assert_eq!(u64::from_json(&json!(5)).unwrap(), 5);
        assert!(u64::from_json(&json!(-1)).is_err());
    }

    #[test]
    fn test_f64_widens_from_integers() {
        assert_eq!(f64::from_json(&json!(2.5)).unwrap(), 2.5);
        assert_eq!(f64::from_json(&json!(3)).unwrap(), 3.0);
        assert_eq!(f64::from_json(&json!(u64::MAX)).unwrap(), u64::MAX as f64);
        assert!(f64::from_json(&json!("3.0")).is_err());
    }

    #[test]
    fn test_bool_and_string_are_strict() {
        assert!(bool::from_json(&json!(true)).unwrap());
        assert!(bool::from_json(&json!(1)).is_err());
        assert_eq!(String::from_json(&json!("hi")).unwrap(), "hi");
        assert!(String::from_json(&json!(true)).is_err());
    }

    #[test]
    fn test_vec_reports_element_index() {
        let values: Vec<i32> = Vec::from_json(&json!([1, 2, 3])).unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        let err = Vec::<i32>::from_json(&json!([1, "x", 3])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
        assert!(err.message().contains("array element 1"));

        assert!(Vec::<i32>::from_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_map_converts_values() {
        let map: HashMap<String, i64> =
            HashMap::from_json(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);

        let err = HashMap::<String, i64>::from_json(&json!({"a": "x"})).unwrap_err();
        assert!(err.message().contains("object member"));
    }

    #[test]
    fn test_unit_serializes_to_null() {
        assert_eq!(().to_json(), Value::Null);
        assert!(<()>::from_json(&Value::Null).is_ok());
        assert!(<()>::from_json(&json!(0)).is_err());
    }

    #[test]
    fn test_into_params_tuples() {
        assert_eq!(().into_params(), Value::Null);
        assert_eq!((1_i32,).into_params(), json!([1]));
        assert_eq!((1_i32, "two", 3.0_f64).into_params(), json!([1, "two", 3.0]));
    }

    #[test]
    fn test_from_params_arity_zero() {
        assert!(<()>::from_params(&Value::Null).is_ok());
        assert!(<()>::from_params(&json!([])).is_ok());
        assert!(<()>::from_params(&json!([1])).is_err());
        assert!(<()>::from_params(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_from_params_checks_arity_first() {
        let (a, b) = <(i32, i32)>::from_params(&json!([10, 20])).unwrap();
        assert_eq!((a, b), (10, 20));

        let err = <(i32, i32)>::from_params(&json!([1])).unwrap_err();
        assert!(err.message().contains("expected 2 parameters, got 1"));

        let err = <(i32, i32)>::from_params(&json!([1, 2, 3])).unwrap_err();
        assert!(err.message().contains("expected 2 parameters, got 3"));
    }

    #[test]
    fn test_from_params_tags_failing_parameter() {
        let err = <(i32, i32)>::from_params(&json!(["a", 2])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
        assert!(err.message().contains("parameter 0"));
    }

    #[test]
    fn test_from_params_rejects_named_arguments() {
        let err = <(i32,)>::from_params(&json!({"a": 1})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
        assert!(err.message().contains("positional"));
    }

    #[test]
    fn test_into_rpc_result_lifts_both_families() {
        let plain: Result<Value, RpcError> = IntoRpcResult::<ValueReturn>::into_rpc_result(5_i32);
        assert_eq!(plain.unwrap(), json!(5));

        let ok: Result<i32, RpcError> = Ok(7);
        assert_eq!(
            IntoRpcResult::<FallibleReturn>::into_rpc_result(ok).unwrap(),
            json!(7)
        );

        let err: Result<i32, RpcError> = Err(RpcError::server_error(-32000, "app"));
        assert!(IntoRpcResult::<FallibleReturn>::into_rpc_result(err).is_err());
    }

    // Domain types plug into the fabric with the same trait pair.
    #[test]
    fn test_user_defined_conversion() {
        #[derive(Debug, PartialEq)]
        struct Point {
            x: f64,
            y: f64,
        }

        impl ToJson for Point {
            fn to_json(&self) -> Value {
                json!({"x": self.x, "y": self.y})
            }
        }

        impl FromJson for Point {
            fn from_json(value: &Value) -> Result<Self, RpcError> {
                let obj = value.as_object().ok_or_else(|| mismatch("object", value))?;
                Ok(Point {
                    x: obj.get("x").and_then(Value::as_f64).ok_or_else(|| {
                        RpcError::invalid_params("point requires a numeric x")
                    })?,
                    y: obj.get("y").and_then(Value::as_f64).ok_or_else(|| {
                        RpcError::invalid_params("point requires a numeric y")
                    })?,
                })
            }
        }

        let point = Point { x: 1.5, y: -2.0 };
        assert_eq!(Point::from_json(&point.to_json()).unwrap(), point);

        let (p,) = <(Point,)>::from_params(&json!([{"x": 0.0, "y": 1.0}])).unwrap();
        assert_eq!(p, Point { x: 0.0, y: 1.0 });
    }
}
