use std::fmt;
use tabled::Tabled;

/// A wrapper around a float that limits the number of decimal places when printed.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

/// Table row for bus results.
#[derive(Debug, Tabled)]
#[allow(non_snake_case)]
pub(crate) struct BusResTable {
    pub(crate) Bus: i64,
    pub(crate) Name: String,
    pub(crate) Type: String,
    pub(crate) Vm: FloatWrapper,
    pub(crate) Va: FloatWrapper,
    pub(crate) P_mw: FloatWrapper,
    pub(crate) Q_mvar: FloatWrapper,
    pub(crate) In_limits: bool,
}

/// Table row for transformer results.
#[derive(Debug, Tabled)]
pub(crate) struct TrafoResTable {
    pub(crate) name: String,
    pub(crate) hv_bus: i64,
    pub(crate) lv_bus: i64,
    pub(crate) p_hv_mw: FloatWrapper,
    pub(crate) q_hv_mvar: FloatWrapper,
    pub(crate) p_lv_mw: FloatWrapper,
    pub(crate) q_lv_mvar: FloatWrapper,
    pub(crate) pl_mw: FloatWrapper,
    pub(crate) ql_mvar: FloatWrapper,
    pub(crate) i_hv_ka: FloatWrapper,
    pub(crate) i_lv_ka: FloatWrapper,
    pub(crate) loading_percent: FloatWrapper,
}
