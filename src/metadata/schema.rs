//! Field schemas
//!
//! A [`SchemaItem`] wraps one JSON-Schema style field definition such as
//! `{"type": "string", "enum": ["DNA", "RNA"]}`. The document is parsed once
//! into a small set of typed rules (string, number, array and object
//! constraints) and values are checked by dispatching on their kind, so a
//! keyword only constrains the values it applies to. Keywords outside the
//! supported set are kept in the document and ignored.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Number, Value};

use super::render::{quote, quote_str};
use super::SchemaError;

/// Primitive types a field can declare
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaType::String),
            "integer" => Some(SchemaType::Integer),
            "number" => Some(SchemaType::Number),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            "null" => Some(SchemaType::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }

    /// Check whether a value is an instance of this type.
    ///
    /// Floats with no fractional part count as integers; booleans are never
    /// numbers.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (SchemaType::String, Value::String(_)) => true,
            (SchemaType::Integer, Value::Number(n)) => is_integral(n),
            (SchemaType::Number, Value::Number(_)) => true,
            (SchemaType::Boolean, Value::Bool(_)) => true,
            (SchemaType::Array, Value::Array(_)) => true,
            (SchemaType::Object, Value::Object(_)) => true,
            (SchemaType::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_integral(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// Equality as used by `enum` and `uniqueItems`: `1` and `1.0` are the same.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || as_f64(x) == as_f64(y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, v)| ym.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

fn count(schema: &Map<String, Value>, keyword: &str) -> Result<Option<u64>, SchemaError> {
    match schema.get(keyword) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| SchemaError::keyword(keyword, "expected a non-negative integer")),
    }
}

fn number(schema: &Map<String, Value>, keyword: &str) -> Result<Option<Number>, SchemaError> {
    match schema.get(keyword) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.clone())),
        Some(_) => Err(SchemaError::keyword(keyword, "expected a number")),
    }
}

fn flag(schema: &Map<String, Value>, keyword: &str) -> Result<bool, SchemaError> {
    match schema.get(keyword) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(SchemaError::keyword(keyword, "expected a boolean")),
    }
}

#[derive(Clone, Debug, Default)]
struct StringRule {
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<Regex>,
}

impl StringRule {
    fn parse(schema: &Map<String, Value>) -> Result<Self, SchemaError> {
        let pattern = match schema.get("pattern") {
            None => None,
            Some(Value::String(p)) => Some(
                Regex::new(p).map_err(|e| SchemaError::keyword("pattern", e.to_string()))?,
            ),
            Some(_) => return Err(SchemaError::keyword("pattern", "expected a string")),
        };

        Ok(Self {
            min_length: count(schema, "minLength")?,
            max_length: count(schema, "maxLength")?,
            pattern,
        })
    }

    fn check(&self, s: &str, value: &Value, out: &mut Vec<String>) {
        let length = s.chars().count() as u64;

        if let Some(min) = self.min_length {
            if length < min {
                out.push(format!("{} is too short", quote(value)));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                out.push(format!("{} is too long", quote(value)));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(s) {
                out.push(format!(
                    "{} does not match {}",
                    quote(value),
                    quote_str(pattern.as_str())
                ));
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
struct NumberRule {
    minimum: Option<Number>,
    maximum: Option<Number>,
    exclusive_minimum: Option<Number>,
    exclusive_maximum: Option<Number>,
    multiple_of: Option<Number>,
}

impl NumberRule {
    fn parse(schema: &Map<String, Value>) -> Result<Self, SchemaError> {
        let multiple_of = number(schema, "multipleOf")?;
        if let Some(m) = &multiple_of {
            let divisor = as_f64(m);
            if divisor.is_nan() || divisor <= 0.0 {
                return Err(SchemaError::keyword(
                    "multipleOf",
                    "expected a number greater than 0",
                ));
            }
        }

        Ok(Self {
            minimum: number(schema, "minimum")?,
            maximum: number(schema, "maximum")?,
            exclusive_minimum: number(schema, "exclusiveMinimum")?,
            exclusive_maximum: number(schema, "exclusiveMaximum")?,
            multiple_of,
        })
    }

    fn check(&self, n: &Number, out: &mut Vec<String>) {
        let v = as_f64(n);

        if let Some(min) = &self.minimum {
            if v < as_f64(min) {
                out.push(format!("{} is less than the minimum of {}", n, min));
            }
        }
        if let Some(max) = &self.maximum {
            if v > as_f64(max) {
                out.push(format!("{} is greater than the maximum of {}", n, max));
            }
        }
        if let Some(min) = &self.exclusive_minimum {
            if v <= as_f64(min) {
                out.push(format!(
                    "{} is less than or equal to the minimum of {}",
                    n, min
                ));
            }
        }
        if let Some(max) = &self.exclusive_maximum {
            if v >= as_f64(max) {
                out.push(format!(
                    "{} is greater than or equal to the maximum of {}",
                    n, max
                ));
            }
        }
        if let Some(m) = &self.multiple_of {
            if !is_multiple(n, m) {
                out.push(format!("{} is not a multiple of {}", n, m));
            }
        }
    }
}

fn is_multiple(n: &Number, m: &Number) -> bool {
    match (n.as_i64(), m.as_i64()) {
        (Some(a), Some(b)) if b != 0 => a % b == 0,
        _ => {
            let quotient = as_f64(n) / as_f64(m);
            quotient.is_finite() && quotient.fract() == 0.0
        }
    }
}

#[derive(Clone, Debug, Default)]
struct ArrayRule {
    items: Option<Box<SchemaItem>>,
    min_items: Option<u64>,
    max_items: Option<u64>,
    unique_items: bool,
}

impl ArrayRule {
    fn parse(schema: &Map<String, Value>) -> Result<Self, SchemaError> {
        let items = match schema.get("items") {
            None => None,
            Some(v @ Value::Object(_)) => Some(Box::new(SchemaItem::new(v.clone())?)),
            Some(_) => return Err(SchemaError::keyword("items", "expected a schema object")),
        };

        Ok(Self {
            items,
            min_items: count(schema, "minItems")?,
            max_items: count(schema, "maxItems")?,
            unique_items: flag(schema, "uniqueItems")?,
        })
    }

    fn check(&self, items: &[Value], value: &Value, out: &mut Vec<String>) {
        if let Some(schema) = &self.items {
            for item in items {
                schema.collect_issues(item, out);
            }
        }

        let length = items.len() as u64;
        if let Some(min) = self.min_items {
            if length < min {
                out.push(format!("{} is too short", quote(value)));
            }
        }
        if let Some(max) = self.max_items {
            if length > max {
                out.push(format!("{} is too long", quote(value)));
            }
        }
        if self.unique_items && has_duplicates(items) {
            out.push(format!("{} has non-unique elements", quote(value)));
        }
    }
}

fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| values_equal(a, b)))
}

#[derive(Clone, Debug, Default)]
struct ObjectRule {
    properties: BTreeMap<String, SchemaItem>,
    required: Vec<String>,
}

impl ObjectRule {
    fn parse(schema: &Map<String, Value>) -> Result<Self, SchemaError> {
        let mut properties = BTreeMap::new();
        match schema.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                for (name, property) in props {
                    properties.insert(name.clone(), SchemaItem::new(property.clone())?);
                }
            }
            Some(_) => return Err(SchemaError::keyword("properties", "expected an object")),
        }

        let required = match schema.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| SchemaError::keyword("required", "expected strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SchemaError::keyword("required", "expected an array")),
        };

        Ok(Self {
            properties,
            required,
        })
    }

    fn check(&self, map: &Map<String, Value>, out: &mut Vec<String>) {
        for name in &self.required {
            if !map.contains_key(name) {
                out.push(format!("{} is a required property", quote_str(name)));
            }
        }
        for (name, schema) in &self.properties {
            if let Some(v) = map.get(name) {
                schema.collect_issues(v, out);
            }
        }
    }
}

/// One metadata field definition
///
/// Immutable once built. Two items are equal when their schema documents are.
#[derive(Clone, Debug)]
pub struct SchemaItem {
    schema: Value,
    declared: Option<SchemaType>,
    enumeration: Option<Vec<Value>>,
    strings: StringRule,
    numbers: NumberRule,
    arrays: ArrayRule,
    objects: ObjectRule,
}

impl SchemaItem {
    /// Build a schema item, rejecting documents that are not valid schemas.
    pub fn new(schema: Value) -> Result<Self, SchemaError> {
        let map = schema
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject(quote(&schema)))?;

        let declared = match map.get("type") {
            None => None,
            Some(Value::String(name)) => Some(
                SchemaType::parse(name).ok_or_else(|| SchemaError::UnknownType(name.clone()))?,
            ),
            Some(Value::Array(_)) => {
                return Err(SchemaError::keyword(
                    "type",
                    "a list of types is not supported",
                ))
            }
            Some(other) => return Err(SchemaError::UnknownType(other.to_string())),
        };

        let enumeration = match map.get("enum") {
            None => None,
            Some(Value::Array(options)) => Some(options.clone()),
            Some(_) => return Err(SchemaError::keyword("enum", "expected an array")),
        };

        let strings = StringRule::parse(map)?;
        let numbers = NumberRule::parse(map)?;
        let arrays = ArrayRule::parse(map)?;
        let objects = ObjectRule::parse(map)?;

        Ok(Self {
            declared,
            enumeration,
            strings,
            numbers,
            arrays,
            objects,
            schema,
        })
    }

    /// The declared type, if the schema declares one.
    pub fn schema_type(&self) -> Option<SchemaType> {
        self.declared
    }

    /// The permitted values, in schema order.
    pub fn enum_values(&self) -> Option<&[Value]> {
        self.enumeration.as_deref()
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn is_okay(&self, value: &Value) -> bool {
        self.issues(value).is_empty()
    }

    /// Every validation failure for `value`, each as a self-contained message.
    pub fn issues(&self, value: &Value) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_issues(value, &mut out);
        out
    }

    fn collect_issues(&self, value: &Value, out: &mut Vec<String>) {
        if let Some(declared) = self.declared {
            if !declared.matches(value) {
                out.push(format!("{} is not of type '{}'", quote(value), declared));
            }
        }

        if let Some(options) = &self.enumeration {
            if !options.iter().any(|o| values_equal(o, value)) {
                out.push(format!(
                    "{} is not one of {}",
                    quote(value),
                    quote(&Value::Array(options.clone()))
                ));
            }
        }

        match value {
            Value::String(s) => self.strings.check(s, value, out),
            Value::Number(n) => self.numbers.check(n, out),
            Value::Array(items) => self.arrays.check(items, value, out),
            Value::Object(map) => self.objects.check(map, out),
            Value::Null | Value::Bool(_) => {}
        }
    }
}

impl Default for SchemaItem {
    /// The empty schema, which accepts any value.
    fn default() -> Self {
        Self {
            schema: Value::Object(Map::new()),
            declared: None,
            enumeration: None,
            strings: StringRule::default(),
            numbers: NumberRule::default(),
            arrays: ArrayRule::default(),
            objects: ObjectRule::default(),
        }
    }
}

impl PartialEq for SchemaItem {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_string_metadata() {
        let item = SchemaItem::new(json!({"type": "string"})).unwrap();
        assert_eq!(item.schema_type(), Some(SchemaType::String));
        assert!(item.enum_values().is_none());

        assert!(item.is_okay(&json!("test")));
        assert!(!item.is_okay(&json!(1)));
        assert_eq!(item.issues(&json!(1)), vec!["1 is not of type 'string'"]);
    }

    #[test]
    fn test_enum_integer_metadata() {
        let item = SchemaItem::new(json!({"type": "integer", "enum": [1, 2, 3]})).unwrap();
        assert_eq!(item.schema_type(), Some(SchemaType::Integer));
        assert_eq!(item.enum_values().unwrap(), &[json!(1), json!(2), json!(3)]);

        assert!(item.is_okay(&json!(1)));
        assert!(!item.is_okay(&json!(4)));
        assert!(!item.is_okay(&json!(1.1)));
        assert_eq!(item.issues(&json!(4)), vec!["4 is not one of [1, 2, 3]"]);
    }

    #[test]
    fn test_enum_string_message() {
        let item = SchemaItem::new(json!({"type": "string", "enum": ["DNA", "RNA"]})).unwrap();
        assert!(item.is_okay(&json!("RNA")));
        assert_eq!(
            item.issues(&json!("Not DNA")),
            vec!["'Not DNA' is not one of ['DNA', 'RNA']"]
        );
    }

    #[test]
    fn test_invalid_schema() {
        assert_eq!(
            SchemaItem::new(json!({"type": "dontexist"})).unwrap_err(),
            SchemaError::UnknownType("dontexist".to_string())
        );
        assert!(SchemaItem::new(json!("string")).is_err());
        assert!(SchemaItem::new(json!({"type": "string", "maxLength": -1})).is_err());
        assert!(SchemaItem::new(json!({"type": "integer", "minimum": "0"})).is_err());
        assert!(SchemaItem::new(json!({"enum": "DNA"})).is_err());
        assert!(SchemaItem::new(json!({"type": "string", "pattern": "("})).is_err());
        assert!(SchemaItem::new(json!({"type": "number", "multipleOf": 0})).is_err());
        assert!(SchemaItem::new(json!({"type": "array", "items": {"type": "nope"}})).is_err());
    }

    #[test]
    fn test_issues_method() {
        let item = SchemaItem::new(json!({
            "type": "array",
            "items": {"enum": [1, 2, 3]},
            "maxItems": 2
        }))
        .unwrap();

        assert!(item.is_okay(&json!([1, 2])));
        assert!(item.issues(&json!([1, 2])).is_empty());

        assert!(!item.is_okay(&json!([1, 2, 4])));
        let mut issues = item.issues(&json!([1, 2, 4]));
        issues.sort();
        assert_eq!(issues, vec!["4 is not one of [1, 2, 3]", "[1, 2, 4] is too long"]);
    }

    #[test]
    fn test_schema_property() {
        let schema = json!({"type": "integer", "enum": [1, 2, 3]});
        let item = SchemaItem::new(schema.clone()).unwrap();
        assert_eq!(item.schema(), &schema);
        assert_eq!(item, SchemaItem::new(schema).unwrap());
        assert_ne!(item, SchemaItem::new(json!({"type": "integer"})).unwrap());
    }

    #[test]
    fn test_string_length_and_pattern() {
        let item = SchemaItem::new(json!({
            "type": "string",
            "minLength": 3,
            "maxLength": 5,
            "pattern": "^[a-z]+$"
        }))
        .unwrap();

        assert_eq!(item.issues(&json!("x")), vec!["'x' is too short"]);
        assert_eq!(item.issues(&json!("abcdef")), vec!["'abcdef' is too long"]);
        assert_eq!(item.issues(&json!("AB1")), vec!["'AB1' does not match '^[a-z]+$'"]);
        assert!(item.is_okay(&json!("abc")));
    }

    #[test]
    fn test_numeric_bounds() {
        let age = SchemaItem::new(json!({"type": "integer", "minimum": 0, "maximum": 90})).unwrap();
        assert!(age.is_okay(&json!(10)));
        assert!(age.is_okay(&json!(10.0)));
        assert_eq!(age.issues(&json!(-1)), vec!["-1 is less than the minimum of 0"]);
        assert_eq!(age.issues(&json!(91)), vec!["91 is greater than the maximum of 90"]);
        assert_eq!(
            age.issues(&json!("not a number")),
            vec!["'not a number' is not of type 'integer'"]
        );

        let ratio = SchemaItem::new(json!({
            "type": "number",
            "exclusiveMinimum": 0,
            "exclusiveMaximum": 1,
            "multipleOf": 0.25
        }))
        .unwrap();
        assert!(ratio.is_okay(&json!(0.5)));
        assert_eq!(
            ratio.issues(&json!(0)),
            vec!["0 is less than or equal to the minimum of 0"]
        );
        assert_eq!(
            ratio.issues(&json!(1)),
            vec!["1 is greater than or equal to the maximum of 1"]
        );
        assert_eq!(ratio.issues(&json!(0.3)), vec!["0.3 is not a multiple of 0.25"]);
    }

    #[test]
    fn test_booleans_are_not_numbers() {
        let item = SchemaItem::new(json!({"type": "integer"})).unwrap();
        assert!(!item.is_okay(&json!(true)));

        let flag = SchemaItem::new(json!({"type": "boolean"})).unwrap();
        assert!(flag.is_okay(&json!(false)));
        assert!(!flag.is_okay(&json!(0)));
    }

    #[test]
    fn test_null_against_typed_and_empty_schema() {
        let item = SchemaItem::new(json!({"type": "string"})).unwrap();
        assert_eq!(item.issues(&Value::Null), vec!["null is not of type 'string'"]);

        let any = SchemaItem::default();
        assert!(any.is_okay(&Value::Null));
        assert!(any.is_okay(&json!({"nested": [1, 2]})));
        assert_eq!(any.schema_type(), None);
        assert_eq!(any, SchemaItem::new(json!({})).unwrap());
    }

    #[test]
    fn test_unknown_keywords_are_ignored() {
        let item = SchemaItem::new(json!({"type": "string", "minLenght": 3, "maxLength": 80}))
            .unwrap();
        assert!(item.is_okay(&json!("x")));
    }

    #[test]
    fn test_unique_items_and_objects() {
        let tags = SchemaItem::new(json!({"type": "array", "uniqueItems": true, "minItems": 1}))
            .unwrap();
        assert_eq!(tags.issues(&json!([1, 1.0])), vec!["[1, 1.0] has non-unique elements"]);
        assert_eq!(tags.issues(&json!([])), vec!["[] is too short"]);

        let person = SchemaItem::new(json!({
            "type": "object",
            "properties": {"age": {"type": "integer"}},
            "required": ["name"]
        }))
        .unwrap();
        let mut issues = person.issues(&json!({"age": "old"}));
        issues.sort();
        assert_eq!(
            issues,
            vec!["'name' is a required property", "'old' is not of type 'integer'"]
        );
    }

    #[test]
    fn test_is_okay_agrees_with_issues() {
        let schemas = vec![
            json!({}),
            json!({"type": "string", "maxLength": 3}),
            json!({"type": "integer", "enum": [1, 2]}),
            json!({"type": "number", "minimum": 1.5}),
            json!({"type": "array", "items": {"type": "string"}}),
        ];
        let values = vec![
            Value::Null,
            json!(true),
            json!(1),
            json!(2.5),
            json!("abcd"),
            json!(["a", 1]),
            json!({"k": "v"}),
        ];

        for schema in schemas {
            let item = SchemaItem::new(schema).unwrap();
            for value in &values {
                assert_eq!(item.is_okay(value), item.issues(value).is_empty());
            }
        }
    }
}
