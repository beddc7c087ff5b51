//! Editing actions and their JSON wire format.
//!
//! An action list arrives as `{"actions": [...]}` (or a bare array), each
//! entry an object tagged by its `"action"` string. Parsing validates every
//! entry before anything runs, so a malformed entry anywhere in the list
//! fails the whole request and names the offending field.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use vidforge_av::actions::{CropRect, EqAdjustment, FlipDirection};

use crate::error::{Error, Result};

/// Scale target used when `width`/`height` are omitted.
const DEFAULT_SCALE: (i32, i32) = (1920, 1080);

/// One editing step.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Drop the first `seconds`.
    Trim { seconds: f64 },
    /// Contrast, brightness, saturation or gamma.
    Eq(EqAdjustment),
    Hue { degrees: f64 },
    Blur { value: f64 },
    Sharpen { value: f64 },
    Speed { factor: f64 },
    Rotate { degrees: f64 },
    Flip { direction: FlipDirection },
    Crop(CropRect),
    Scale { width: i32, height: i32 },
    Volume { db: f64 },
    /// Remove `[start, end)` and join the remainder.
    CutSection { start: f64, end: f64 },
    /// An `action` string this service does not know; skipped at run time.
    Unknown { kind: String },
}

impl Action {
    /// The wire name of this action.
    pub fn kind(&self) -> &str {
        match self {
            Action::Trim { .. } => "trim",
            Action::Eq(EqAdjustment::Contrast(_)) => "adjust_contrast",
            Action::Eq(EqAdjustment::Brightness(_)) => "brightness",
            Action::Eq(EqAdjustment::Saturation(_)) => "saturation",
            Action::Eq(EqAdjustment::Gamma(_)) => "gamma",
            Action::Hue { .. } => "hue",
            Action::Blur { .. } => "blur",
            Action::Sharpen { .. } => "sharpen",
            Action::Speed { .. } => "speed",
            Action::Rotate { .. } => "rotate",
            Action::Flip { .. } => "flip",
            Action::Crop(_) => "crop",
            Action::Scale { .. } => "scale",
            Action::Volume { .. } => "volume",
            Action::CutSection { .. } => "cut_section",
            Action::Unknown { kind } => kind,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown { .. })
    }

    /// Parse and validate the entry at `index` of an action list.
    pub fn from_value(index: usize, value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            Error::invalid_action(index, "?", "entry", "must be a JSON object")
        })?;

        let kind = match obj.get("action") {
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(Error::invalid_action(index, "?", "action", "must be a string"))
            }
            None => return Err(Error::invalid_action(index, "?", "action", "is required")),
        };

        let fields = Fields { index, kind, obj };

        let action = match kind {
            "trim" => Action::Trim {
                seconds: fields.non_negative("value", 0.0)?,
            },
            "adjust_contrast" => Action::Eq(EqAdjustment::Contrast(fields.number("value", 0.0)?)),
            "brightness" => Action::Eq(EqAdjustment::Brightness(fields.number("value", 0.0)?)),
            "saturation" => Action::Eq(EqAdjustment::Saturation(fields.number("value", 0.0)?)),
            "gamma" => Action::Eq(EqAdjustment::Gamma(fields.number("value", 0.0)?)),
            "hue" => Action::Hue {
                degrees: fields.number("value", 0.0)?,
            },
            "blur" => Action::Blur {
                value: fields.number("value", 0.0)?,
            },
            "sharpen" => Action::Sharpen {
                value: fields.number("value", 0.0)?,
            },
            "speed" => Action::Speed {
                factor: fields.number("value", 0.0)?,
            },
            "rotate" => Action::Rotate {
                degrees: fields.number("value", 0.0)?,
            },
            "flip" => Action::Flip {
                direction: fields.direction("direction")?,
            },
            "crop" => {
                let defaults = CropRect::default();
                let rect = CropRect {
                    x: fields.unsigned("x", defaults.x)?,
                    y: fields.unsigned("y", defaults.y)?,
                    width: fields.unsigned("width", defaults.width)?,
                    height: fields.unsigned("height", defaults.height)?,
                };
                if rect.width == 0 {
                    return Err(fields.error("width", "must be positive"));
                }
                if rect.height == 0 {
                    return Err(fields.error("height", "must be positive"));
                }
                Action::Crop(rect)
            }
            "scale" => Action::Scale {
                width: fields.dimension("width", DEFAULT_SCALE.0)?,
                height: fields.dimension("height", DEFAULT_SCALE.1)?,
            },
            "volume" => Action::Volume {
                db: fields.number("value", 0.0)?,
            },
            "cut_section" => {
                let start = fields.required_non_negative("start_time")?;
                let end = fields.required_non_negative("end_time")?;
                if end <= start {
                    return Err(fields.error(
                        "end_time",
                        format!("must be greater than start_time ({start})"),
                    ));
                }
                Action::CutSection { start, end }
            }
            other => Action::Unknown {
                kind: other.to_string(),
            },
        };

        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Trim { seconds } => write!(f, "trim {seconds}s"),
            Action::Eq(adj) => write!(f, "{}", adj.filter()),
            Action::Hue { degrees } => write!(f, "hue {degrees}"),
            Action::Blur { value } => write!(f, "blur {value}"),
            Action::Sharpen { value } => write!(f, "sharpen {value}"),
            Action::Speed { factor } => write!(f, "speed {factor}x"),
            Action::Rotate { degrees } => write!(f, "rotate {degrees}"),
            Action::Flip { direction } => write!(f, "flip {direction}"),
            Action::Crop(r) => write!(f, "crop {}x{}+{}+{}", r.width, r.height, r.x, r.y),
            Action::Scale { width, height } => write!(f, "scale {width}x{height}"),
            Action::Volume { db } => write!(f, "volume {db}dB"),
            Action::CutSection { start, end } => write!(f, "cut {start}s-{end}s"),
            Action::Unknown { kind } => write!(f, "unknown '{kind}'"),
        }
    }
}

/// Field accessors for one action object, producing errors that name the
/// action's index and kind.
struct Fields<'a> {
    index: usize,
    kind: &'a str,
    obj: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn error(&self, field: &str, message: impl Into<String>) -> Error {
        Error::invalid_action(self.index, self.kind, field, message)
    }

    /// A finite number; absent or `null` yields `None`. Numeric strings are
    /// accepted.
    fn optional_number(&self, field: &str) -> Result<Option<f64>> {
        let n = match self.obj.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match n {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(self.error(field, "must be a number")),
        }
    }

    fn number(&self, field: &str, default: f64) -> Result<f64> {
        Ok(self.optional_number(field)?.unwrap_or(default))
    }

    fn non_negative(&self, field: &str, default: f64) -> Result<f64> {
        let n = self.number(field, default)?;
        if n < 0.0 {
            return Err(self.error(field, "must not be negative"));
        }
        Ok(n)
    }

    fn required_non_negative(&self, field: &str) -> Result<f64> {
        match self.optional_number(field)? {
            Some(n) if n < 0.0 => Err(self.error(field, "must not be negative")),
            Some(n) => Ok(n),
            None => Err(self.error(field, "is required")),
        }
    }

    fn integer(&self, field: &str) -> Result<Option<i64>> {
        match self.optional_number(field)? {
            None => Ok(None),
            Some(n) if n.fract() == 0.0 && n.abs() <= i32::MAX as f64 => Ok(Some(n as i64)),
            Some(_) => Err(self.error(field, "must be a whole number")),
        }
    }

    fn unsigned(&self, field: &str, default: u32) -> Result<u32> {
        match self.integer(field)? {
            None => Ok(default),
            Some(n) => u32::try_from(n).map_err(|_| self.error(field, "must not be negative")),
        }
    }

    /// A scale dimension: positive, or `-1` to keep the aspect ratio.
    fn dimension(&self, field: &str, default: i32) -> Result<i32> {
        match self.integer(field)? {
            None => Ok(default),
            Some(n) if n > 0 || n == -1 => Ok(n as i32),
            Some(_) => Err(self.error(field, "must be positive or -1")),
        }
    }

    fn direction(&self, field: &str) -> Result<FlipDirection> {
        match self.obj.get(field) {
            None | Some(Value::Null) => Ok(FlipDirection::Horizontal),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| self.error(field, "must be 'horizontal' or 'vertical'")),
            Some(_) => Err(self.error(field, "must be a string")),
        }
    }
}

/// An ordered list of actions; order is execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionList {
    pub actions: Vec<Action>,
}

impl ActionList {
    /// Parse from a JSON value: `{"actions": [...]}` or a bare array.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(obj) => match obj.get("actions") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(Error::BadRequest("'actions' must be an array".to_string()))
                }
                None => {
                    return Err(Error::BadRequest(
                        "expected an object with an 'actions' array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(Error::BadRequest(
                    "expected an object with an 'actions' array".to_string(),
                ))
            }
        };

        let actions = items
            .iter()
            .enumerate()
            .map(|(i, v)| Action::from_value(i, v))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { actions })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Kinds that will be skipped because they are not recognised.
    pub fn skipped(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter(|a| a.is_unknown())
            .map(|a| a.kind().to_string())
            .collect()
    }
}

impl FromStr for ActionList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| Error::BadRequest(format!("actions is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }
}

impl From<Vec<Action>> for ActionList {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn parse_one(v: Value) -> Result<Action> {
        Action::from_value(0, &v)
    }

    #[test]
    fn parses_wrapped_and_bare_lists() {
        let wrapped: ActionList = r#"{"actions":[{"action":"trim","value":5}]}"#.parse().unwrap();
        let bare: ActionList = r#"[{"action":"trim","value":5}]"#.parse().unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.actions, vec![Action::Trim { seconds: 5.0 }]);
    }

    #[test]
    fn empty_list_is_valid() {
        let list: ActionList = r#"{"actions":[]}"#.parse().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let err = "{not json".parse::<ActionList>().unwrap_err();
        assert_matches!(err, Error::BadRequest(_));
        let err = r#"{"steps":[]}"#.parse::<ActionList>().unwrap_err();
        assert_matches!(err, Error::BadRequest(_));
    }

    #[test]
    fn defaults_apply() {
        assert_eq!(
            parse_one(json!({"action": "adjust_contrast"})).unwrap(),
            Action::Eq(EqAdjustment::Contrast(0.0))
        );
        assert_eq!(
            parse_one(json!({"action": "flip"})).unwrap(),
            Action::Flip {
                direction: FlipDirection::Horizontal
            }
        );
        assert_eq!(
            parse_one(json!({"action": "crop"})).unwrap(),
            Action::Crop(CropRect::default())
        );
        assert_eq!(
            parse_one(json!({"action": "scale"})).unwrap(),
            Action::Scale {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(
            parse_one(json!({"action": "speed", "value": "1.5"})).unwrap(),
            Action::Speed { factor: 1.5 }
        );
    }

    #[test]
    fn unknown_kind_is_inert() {
        let list: ActionList =
            r#"[{"action":"bogus_action"},{"action":"hue","value":30}]"#.parse().unwrap();
        assert_eq!(
            list.actions[0],
            Action::Unknown {
                kind: "bogus_action".into()
            }
        );
        assert_eq!(list.skipped(), vec!["bogus_action".to_string()]);
    }

    #[test]
    fn cut_section_requires_both_bounds() {
        let err = parse_one(json!({"action": "cut_section", "start_time": 5})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "end_time");
        assert!(err.to_string().contains("end_time"));

        let err = parse_one(json!({"action": "cut_section", "end_time": 5})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "start_time");
    }

    #[test]
    fn cut_section_end_must_follow_start() {
        let err = parse_one(json!({"action": "cut_section", "start_time": 10, "end_time": 10}))
            .unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "end_time");

        assert_eq!(
            parse_one(json!({"action": "cut_section", "start_time": 0, "end_time": 2.5})).unwrap(),
            Action::CutSection {
                start: 0.0,
                end: 2.5
            }
        );
    }

    #[test]
    fn flip_direction_validated() {
        let err = parse_one(json!({"action": "flip", "direction": "diagonal"})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "direction");
        assert_eq!(
            parse_one(json!({"action": "flip", "direction": "V"})).unwrap(),
            Action::Flip {
                direction: FlipDirection::Vertical
            }
        );
    }

    #[test]
    fn geometry_validated() {
        let err = parse_one(json!({"action": "crop", "width": 0})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "width");
        let err = parse_one(json!({"action": "crop", "x": -4})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "x");
        let err = parse_one(json!({"action": "scale", "height": 0})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "height");
        assert_eq!(
            parse_one(json!({"action": "scale", "width": 1280, "height": -1})).unwrap(),
            Action::Scale {
                width: 1280,
                height: -1
            }
        );
    }

    #[test]
    fn error_names_index_and_kind() {
        let err = r#"[{"action":"trim","value":1},{"action":"hue","value":"warm"}]"#
            .parse::<ActionList>()
            .unwrap_err();
        assert_matches!(
            err,
            Error::InvalidAction { index: 1, ref kind, ref field, .. }
                if kind == "hue" && field == "value"
        );
    }

    #[test]
    fn missing_action_tag() {
        let err = parse_one(json!({"value": 3})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "action");
        let err = parse_one(json!("trim")).unwrap_err();
        assert_matches!(err, Error::InvalidAction { .. });
    }

    #[test]
    fn negative_trim_rejected() {
        let err = parse_one(json!({"action": "trim", "value": -2})).unwrap_err();
        assert_matches!(err, Error::InvalidAction { ref field, .. } if field == "value");
    }
}
