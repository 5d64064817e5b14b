use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::{CustomType, ScalarKind, Value};

thread_local! {
    // Memo tables for parametrized types, keyed by the parameter tuple.
    // Entries are never evicted.
    static ENUMERATED: RefCell<HashMap<(String, Vec<String>), Rc<CustomType>>> =
        RefCell::new(HashMap::default());
    static KEY_VALUE_PAIRS: RefCell<HashMap<(String, String), Rc<CustomType>>> =
        RefCell::new(HashMap::default());
}

const PAIR_SEPARATOR: char = ',';
const ITEM_SEPARATOR: char = '=';

/// A custom scalar kind restricted to an enumerated set of string values.
///
/// The set doubles as the choice marker, so registered options validate
/// against it and help renders it as `{a,b,c}`.  Calls with the same name and
/// values return the same memoized type.
///
/// ### Example
/// ```
/// use declarg::{enumerated, TypeExpr};
///
/// let device = enumerated("device", ["cpu", "cuda"]);
/// let field_type = TypeExpr::custom(device);
/// ```
pub fn enumerated(
    name: impl Into<String>,
    values: impl IntoIterator<Item = impl Into<String>>,
) -> Rc<CustomType> {
    let name = name.into();
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    ENUMERATED.with(|cache| {
        let mut cache = cache.borrow_mut();
        let key = (name.clone(), values.clone());
        Rc::clone(cache.entry(key).or_insert_with(|| {
            let allowed = values.clone();
            CustomType::with_details(name, None, Some(values), move |token| {
                if allowed.iter().any(|value| value == token) {
                    Ok(Value::Str(token.to_string()))
                } else {
                    Err(format!("'{token}' is not one of the allowed values"))
                }
            })
        }))
    })
}

/// A custom scalar kind parsing one `k=v,k2=v2` token into a
/// [`Value::Map`].
///
/// Each item is split on the first `=`, and the key and value sides are
/// converted to the given kinds.  A repeated key overwrites the earlier
/// entry, and an empty token yields an empty mapping.  Calls with the same
/// kinds return the same memoized type.
///
/// ### Example
/// ```
/// use declarg::{key_value_pairs, ScalarKind, TypeExpr};
///
/// let overrides = key_value_pairs(ScalarKind::Str, ScalarKind::Int);
/// let field_type = TypeExpr::custom(overrides);
/// ```
pub fn key_value_pairs(key: ScalarKind, value: ScalarKind) -> Rc<CustomType> {
    let memo_key = (
        key.display_name().to_string(),
        value.display_name().to_string(),
    );
    KEY_VALUE_PAIRS.with(|cache| {
        let mut cache = cache.borrow_mut();
        Rc::clone(cache.entry(memo_key.clone()).or_insert_with(|| {
            let name = format!("key_value_pairs[{},{}]", memo_key.0, memo_key.1);
            let metavar = format!("key{ITEM_SEPARATOR}val{PAIR_SEPARATOR}...");
            CustomType::with_details(name, Some(metavar), None, move |token| {
                if token.is_empty() {
                    return Ok(Value::Map(Vec::default()));
                }
                let mut pairs: Vec<(Value, Value)> = Vec::default();
                for item in token.split(PAIR_SEPARATOR) {
                    let (key_s, value_s) = item.split_once(ITEM_SEPARATOR).ok_or_else(|| {
                        format!("'{item}' is not a valid '{ITEM_SEPARATOR}' separated pair")
                    })?;
                    let parsed_key = key
                        .convert_token(key_s)
                        .map_err(|reason| format!("invalid key '{key_s}': {reason}"))?;
                    let parsed_value = value
                        .convert_token(value_s)
                        .map_err(|reason| format!("invalid value '{value_s}': {reason}"))?;
                    match pairs.iter_mut().find(|(existing, _)| *existing == parsed_key) {
                        Some(entry) => entry.1 = parsed_value,
                        None => pairs.push((parsed_key, parsed_value)),
                    }
                }
                Ok(Value::Map(pairs))
            })
        }))
    })
}
