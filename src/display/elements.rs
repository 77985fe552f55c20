//! Addressable presentation elements that `modify_gui` can change.
//!
//! The registry only records property values. Whatever renders the display
//! reads them from each [`DisplayFrame`](super::DisplayFrame).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::Category;

/// The kind of an element, which decides the properties it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Label,
    Button,
    Panel,
    Slot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyType {
    Text,
    Flag,
}

impl ElementKind {
    fn property_type(&self, property: &str) -> Option<PropertyType> {
        use PropertyType::*;
        let common = match property {
            "visible" => Some(Flag),
            "background" | "foreground" => Some(Text),
            _ => None,
        };
        let specific = match (self, property) {
            (ElementKind::Label | ElementKind::Button, "text" | "font") => Some(Text),
            (ElementKind::Button, "enabled") => Some(Flag),
            (ElementKind::Panel | ElementKind::Slot, "title") => Some(Text),
            (ElementKind::Slot, "border_color") => Some(Text),
            _ => None,
        };
        common.or(specific)
    }
}

/// Errors returned when modifying an element.
#[derive(Debug, Error, PartialEq)]
pub enum ElementError {
    #[error("Element '{0}' not found")]
    NotFound(String),

    #[error("Element '{element}' has no property '{property}'")]
    UnknownProperty { element: String, property: String },

    #[error("Property '{property}' of element '{element}' expects {expected}")]
    InvalidValue { element: String, property: String, expected: &'static str },
}

/// One element and its current property values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub kind: ElementKind,
    pub properties: Map<String, Value>,
}

/// All addressable elements, keyed by element id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementRegistry {
    elements: BTreeMap<String, Element>,
}

impl ElementRegistry {
    /// Builds the standard element set for the given slot counts.
    pub fn with_defaults(car_plate_slots: usize, person_slots: usize) -> Self {
        let mut registry = Self::default();
        registry.register("status_bar", ElementKind::Label);
        registry.register("plate_ticker", ElementKind::Label);
        for category in Category::ALL {
            registry.register(&format!("{}_counter", category.as_str()), ElementKind::Label);
        }
        for button in ["start_button", "stop_button", "reset_button"] {
            registry.register(button, ElementKind::Button);
        }
        registry.register("video_panel", ElementKind::Panel);
        for i in 0..car_plate_slots {
            registry.register(&format!("car_plate_slot_{i}"), ElementKind::Slot);
        }
        for i in 0..person_slots {
            registry.register(&format!("person_slot_{i}"), ElementKind::Slot);
        }
        registry
    }

    /// Adds an element with no properties set. Replaces an existing element.
    pub fn register(&mut self, id: &str, kind: ElementKind) {
        self.elements.insert(id.to_string(), Element { kind, properties: Map::new() });
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Applies `properties` to element `id`. Either every property is applied
    /// or none is.
    pub fn modify(&mut self, id: &str, properties: &Map<String, Value>) -> Result<(), ElementError> {
        let element =
            self.elements.get_mut(id).ok_or_else(|| ElementError::NotFound(id.to_string()))?;

        for (property, value) in properties {
            let expected = element.kind.property_type(property).ok_or_else(|| {
                ElementError::UnknownProperty { element: id.to_string(), property: property.clone() }
            })?;
            let matches = match expected {
                PropertyType::Text => value.is_string(),
                PropertyType::Flag => value.is_boolean(),
            };
            if !matches {
                return Err(ElementError::InvalidValue {
                    element: id.to_string(),
                    property: property.clone(),
                    expected: match expected {
                        PropertyType::Text => "a string",
                        PropertyType::Flag => "a boolean",
                    },
                });
            }
        }

        for (property, value) in properties {
            element.properties.insert(property.clone(), value.clone());
        }
        Ok(())
    }

    /// A copy of every element's properties, for rendering.
    pub fn snapshot(&self) -> BTreeMap<String, Element> {
        self.elements.clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_follow_slot_counts() {
        let registry = ElementRegistry::with_defaults(2, 1);
        assert!(registry.get("car_plate_slot_1").is_some());
        assert!(registry.get("car_plate_slot_2").is_none());
        assert!(registry.get("person_slot_0").is_some());
        assert!(registry.get("traffic_light_counter").is_some());
        assert_eq!(registry.get("start_button").unwrap().kind, ElementKind::Button);
    }

    #[test]
    fn test_modify_sets_properties() {
        let mut registry = ElementRegistry::with_defaults(3, 3);
        registry
            .modify("status_bar", &props(json!({ "text": "Maintenance", "visible": true })))
            .unwrap();

        let element = registry.get("status_bar").unwrap();
        assert_eq!(element.properties["text"], json!("Maintenance"));
        assert_eq!(element.properties["visible"], json!(true));
    }

    #[test]
    fn test_modify_unknown_element() {
        let mut registry = ElementRegistry::with_defaults(3, 3);
        let err = registry.modify("launch_button", &props(json!({ "text": "Go" }))).unwrap_err();
        assert_eq!(err, ElementError::NotFound("launch_button".into()));
    }

    #[test]
    fn test_modify_is_all_or_nothing() {
        let mut registry = ElementRegistry::with_defaults(3, 3);
        let err = registry
            .modify("stop_button", &props(json!({ "text": "Halt", "border_color": "red" })))
            .unwrap_err();
        assert!(matches!(err, ElementError::UnknownProperty { .. }));
        assert!(registry.get("stop_button").unwrap().properties.is_empty());

        let err = registry.modify("stop_button", &props(json!({ "enabled": "yes" }))).unwrap_err();
        assert!(matches!(err, ElementError::InvalidValue { expected: "a boolean", .. }));
    }
}
