//! Solver inputs: the fixed set of controls shown in the side panel and the
//! flat `InputSet` they are collected into.

use std::fmt;

use serde::Deserialize;

/// Value of a single solver input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputValue {
    Number(f64),
    Bool(bool),
}

impl fmt::Display for InputValue {
    /// Same text the solver expects in a query string: `5`, `0.5`, `true`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Number(x) => write!(f, "{x}"),
            InputValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Ordered `id → value` mapping, one entry per control.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSet {
    entries: Vec<(String, InputValue)>,
}

impl InputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `id`, keeping the position of an existing key.
    pub fn insert(&mut self, id: impl Into<String>, value: InputValue) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((id, value)),
        }
    }

    pub fn get(&self, id: &str) -> Option<InputValue> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, InputValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// What kind of widget drives an input, with its current state.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlKind {
    /// Numeric field; commits on change.
    Number { value: f64, min: f64, max: f64, speed: f64 },
    /// Range slider; commits when released.
    Slider { value: f64, min: f64, max: f64, step: f64 },
    /// Commits on click.
    Checkbox { checked: bool },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InputControl {
    /// Used verbatim as the solver input name.
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: ControlKind,
}

impl InputControl {
    pub fn value(&self) -> InputValue {
        match self.kind {
            ControlKind::Number { value, .. } | ControlKind::Slider { value, .. } => {
                InputValue::Number(value)
            }
            ControlKind::Checkbox { checked } => InputValue::Bool(checked),
        }
    }

    /// Draws the widget and reports whether the user committed a new value.
    pub fn ui(&mut self, ui: &mut egui::Ui) -> bool {
        match &mut self.kind {
            ControlKind::Number { value, min, max, speed } => {
                ui.horizontal(|ui| {
                    ui.label(self.label.as_str());
                    let response = ui.add(
                        egui::DragValue::new(value)
                            .speed(*speed)
                            .range(*min..=*max),
                    );
                    (response.changed() && !response.dragged()) || response.drag_stopped()
                })
                .inner
            }
            ControlKind::Slider { value, min, max, step } => {
                ui.label(self.label.as_str());
                let response = ui.add(egui::Slider::new(value, *min..=*max).step_by(*step));
                // mouse-up / touch-end on the page; keyboard and clicks land here too
                response.drag_stopped() || (response.changed() && !response.dragged())
            }
            ControlKind::Checkbox { checked } => ui.checkbox(checked, self.label.as_str()).changed(),
        }
    }
}

/// Rebuilds the full input set from every control.
pub fn collect_inputs(controls: &[InputControl]) -> InputSet {
    let mut inputs = InputSet::new();
    for control in controls {
        inputs.insert(control.id.clone(), control.value());
    }
    inputs
}

fn slider(id: &str, label: &str, value: f64, min: f64, max: f64, step: f64) -> InputControl {
    InputControl {
        id: id.into(),
        label: label.into(),
        kind: ControlKind::Slider { value, min, max, step },
    }
}

fn number(id: &str, label: &str, value: f64, min: f64, max: f64) -> InputControl {
    InputControl {
        id: id.into(),
        label: label.into(),
        kind: ControlKind::Number { value, min, max, speed: 0.1 },
    }
}

fn checkbox(id: &str, label: &str, checked: bool) -> InputControl {
    InputControl {
        id: id.into(),
        label: label.into(),
        kind: ControlKind::Checkbox { checked },
    }
}

/// Controls exposed by the solar canopy definition.
pub fn default_controls() -> Vec<InputControl> {
    vec![
        slider("RH_IN:width", "Canopy width (m)", 20.0, 5.0, 60.0, 1.0),
        slider("RH_IN:length", "Canopy length (m)", 30.0, 5.0, 80.0, 1.0),
        slider("RH_IN:height", "Canopy height (m)", 4.0, 2.5, 10.0, 0.1),
        slider("RH_IN:rotation", "Rotation (º)", 0.0, -180.0, 180.0, 1.0),
        number("RH_IN:panelWidth", "Panel width (m)", 1.0, 0.5, 3.0),
        number("RH_IN:panelLength", "Panel length (m)", 1.7, 0.5, 3.0),
        slider("RH_IN:spacing", "Panel spacing (m)", 0.1, 0.0, 1.0, 0.01),
        slider("RH_IN:attractor", "Attractor strength", 0.5, 0.0, 1.0, 0.01),
        checkbox("RH_IN:showStructure", "Show structure", true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbers_print_like_query_values() {
        assert_eq!(InputValue::Number(5.0).to_string(), "5");
        assert_eq!(InputValue::Number(0.5).to_string(), "0.5");
        assert_eq!(InputValue::Number(-12.25).to_string(), "-12.25");
        assert_eq!(InputValue::Bool(true).to_string(), "true");
        assert_eq!(InputValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn collect_takes_every_control_in_order() {
        let controls = default_controls();
        let inputs = collect_inputs(&controls);
        assert_eq!(inputs.len(), controls.len());
        let ids: Vec<&str> = inputs.iter().map(|(k, _)| k).collect();
        let expected: Vec<&str> = controls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, expected);
        assert_eq!(inputs.get("RH_IN:showStructure"), Some(InputValue::Bool(true)));
        assert_eq!(inputs.get("RH_IN:width"), Some(InputValue::Number(20.0)));
    }

    #[test]
    fn collect_reflects_current_widget_state() {
        let mut controls = default_controls();
        if let ControlKind::Slider { value, .. } = &mut controls[0].kind {
            *value = 42.0;
        }
        let inputs = collect_inputs(&controls);
        assert_eq!(inputs.get("RH_IN:width"), Some(InputValue::Number(42.0)));
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut inputs = InputSet::new();
        inputs.insert("a", InputValue::Number(1.0));
        inputs.insert("b", InputValue::Bool(false));
        inputs.insert("a", InputValue::Number(2.0));
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs.iter().next(), Some(("a", InputValue::Number(2.0))));
    }

    #[test]
    fn controls_deserialize_from_config_json() {
        let json = r#"[
            {"id": "RH_IN:a", "label": "A", "kind": "slider", "value": 1, "min": 0, "max": 2, "step": 0.5},
            {"id": "RH_IN:b", "label": "B", "kind": "checkbox", "checked": false}
        ]"#;
        let controls: Vec<InputControl> = serde_json::from_str(json).unwrap();
        assert_eq!(controls[0].value(), InputValue::Number(1.0));
        assert_eq!(controls[1].kind, ControlKind::Checkbox { checked: false });
    }
}
