//! TelescopeConfiguration (spec.md §3). Default elevation limits are
//! grounded on `original_source/qplan/entity.py`'s hardcoded 15°/89°.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomeState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelescopeConfiguration {
    pub focus: String,
    pub dome: DomeState,
    pub min_el_deg: f64,
    pub max_el_deg: f64,
}

impl Default for TelescopeConfiguration {
    fn default() -> Self {
        Self {
            focus: String::new(),
            dome: DomeState::Open,
            min_el_deg: 15.0,
            max_el_deg: 89.0,
        }
    }
}

impl TelescopeConfiguration {
    pub fn new(focus: impl Into<String>) -> Self {
        Self {
            focus: focus.into(),
            ..Default::default()
        }
    }
}
