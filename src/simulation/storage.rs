//! The storage ledger: battery and geological methane storage accounts.
//!
//! Both accounts are clipped at zero and at their capacity. Energy which can't be stored in the
//! battery is reported as wasted and demand which the battery can't cover is reported as missing.
//! Biomethane which doesn't fit into the methane store is discarded without being counted.
use crate::units::{Dimensionless, Energy, Power};

/// The levels of both storage accounts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StorageState {
    /// Energy held in the battery (MWh)
    pub battery_level: Energy,
    /// Fuel energy held in the methane store (MWh)
    pub methane_level: Energy,
}

/// The outcome of applying an hour's surplus or deficit to the battery
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryFlow {
    /// Grid-side energy taken by the battery (positive) or delivered by it (negative)
    pub flow: Energy,
    /// Surplus which couldn't be stored because the battery was full
    pub wasted: Energy,
    /// Deficit which couldn't be covered because the battery was empty
    pub missing: Energy,
}

/// Burn methane to deliver the requested electrical power.
///
/// Fuel is drawn from this hour's biomethane inflow, topped up from the methane store. If there
/// isn't enough fuel, whatever is available is burned and the store is emptied. Otherwise, the
/// store gains the unburned inflow (or loses the shortfall), up to its capacity.
///
/// # Returns
///
/// The electrical power actually delivered.
pub fn apply_methane(
    requested: Power,
    state: &mut StorageState,
    inflow: Energy,
    capacity: Energy,
    efficiency: Dimensionless,
) -> Power {
    let requested = requested.max(Power::ZERO);
    let fuel_needed = requested.over_one_hour() / efficiency;
    let fuel_available = state.methane_level + inflow;

    if fuel_needed > fuel_available {
        state.methane_level = Energy::ZERO;
        return (fuel_available * efficiency).per_hour();
    }

    state.methane_level = (fuel_available - fuel_needed).min(capacity);
    requested
}

/// Charge the battery with a surplus or discharge it to cover a deficit.
///
/// `net` is the hour's generation minus load, including hydro and dispatched methane.
pub fn apply_battery(
    net: Energy,
    state: &mut StorageState,
    capacity: Energy,
    charge_efficiency: Dimensionless,
    discharge_efficiency: Dimensionless,
) -> BatteryFlow {
    if net >= Energy::ZERO {
        if state.battery_level + net * charge_efficiency > capacity {
            let absorbed = (capacity - state.battery_level).max(Energy::ZERO) / charge_efficiency;
            state.battery_level = capacity;
            return BatteryFlow {
                flow: absorbed,
                wasted: net - absorbed,
                missing: Energy::ZERO,
            };
        }

        state.battery_level += net * charge_efficiency;
        return BatteryFlow {
            flow: net,
            ..BatteryFlow::default()
        };
    }

    let deficit = -net;
    let deliverable = state.battery_level * discharge_efficiency;
    if deficit > deliverable {
        state.battery_level = Energy::ZERO;
        return BatteryFlow {
            flow: -deliverable,
            wasted: Energy::ZERO,
            missing: deficit - deliverable,
        };
    }

    state.battery_level = (state.battery_level - deficit / discharge_efficiency).max(Energy::ZERO);
    BatteryFlow {
        flow: net,
        ..BatteryFlow::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const EFFICIENCY: Dimensionless = Dimensionless(0.95);

    fn battery(level: f64) -> StorageState {
        StorageState {
            battery_level: Energy(level),
            methane_level: Energy::ZERO,
        }
    }

    fn methane(level: f64) -> StorageState {
        StorageState {
            battery_level: Energy::ZERO,
            methane_level: Energy(level),
        }
    }

    #[test]
    fn test_apply_battery_depleted() {
        let mut state = battery(0.0);
        let flow = apply_battery(Energy(-50.0), &mut state, Energy(100.0), EFFICIENCY, EFFICIENCY);
        assert_eq!(flow.missing, Energy(50.0));
        assert_eq!(flow.wasted, Energy::ZERO);
        assert_eq!(flow.flow, Energy::ZERO);
        assert_eq!(state.battery_level, Energy::ZERO);
    }

    #[test]
    fn test_apply_battery_overcharge() {
        let mut state = battery(90.0);
        let flow = apply_battery(Energy(20.0), &mut state, Energy(100.0), EFFICIENCY, EFFICIENCY);
        assert_eq!(state.battery_level, Energy(100.0));
        assert_approx_eq!(f64, flow.flow.value(), 10.0 / 0.95);
        assert_approx_eq!(f64, flow.wasted.value(), 20.0 - 10.0 / 0.95);
        assert_approx_eq!(f64, flow.wasted.value(), 9.473_684_210_526_315, epsilon = 1e-12);
        assert_eq!(flow.missing, Energy::ZERO);
    }

    #[test]
    fn test_apply_battery_charge_within_capacity() {
        let mut state = battery(10.0);
        let flow = apply_battery(Energy(20.0), &mut state, Energy(100.0), EFFICIENCY, EFFICIENCY);
        assert_approx_eq!(f64, state.battery_level.value(), 29.0, epsilon = 1e-9);
        assert_eq!(flow.flow, Energy(20.0));
        assert_eq!(flow.wasted, Energy::ZERO);

        // Conservation: wasted + stored / charge efficiency = surplus
        assert_approx_eq!(
            f64,
            flow.wasted.value() + (state.battery_level.value() - 10.0) / 0.95,
            20.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_apply_battery_discharge_within_level() {
        let mut state = battery(50.0);
        let flow = apply_battery(Energy(-19.0), &mut state, Energy(100.0), EFFICIENCY, EFFICIENCY);
        assert_approx_eq!(f64, state.battery_level.value(), 30.0, epsilon = 1e-9);
        assert_eq!(flow.flow, Energy(-19.0));
        assert_eq!(flow.missing, Energy::ZERO);

        // Conservation: missing + withdrawn * discharge efficiency = deficit
        assert_approx_eq!(
            f64,
            flow.missing.value() + (50.0 - state.battery_level.value()) * 0.95,
            19.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_apply_battery_partial_discharge() {
        let mut state = battery(20.0);
        let flow = apply_battery(Energy(-50.0), &mut state, Energy(100.0), EFFICIENCY, EFFICIENCY);
        assert_eq!(state.battery_level, Energy::ZERO);
        assert_approx_eq!(f64, flow.flow.value(), -19.0, epsilon = 1e-9);
        assert_approx_eq!(f64, flow.missing.value(), 31.0, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_battery_zero_capacity() {
        let mut state = battery(0.0);
        let flow = apply_battery(Energy(5.0), &mut state, Energy::ZERO, EFFICIENCY, EFFICIENCY);
        assert_eq!(state.battery_level, Energy::ZERO);
        assert_eq!(flow.wasted, Energy(5.0));
        assert_eq!(flow.flow, Energy::ZERO);
    }

    #[rstest]
    #[case(0.0, 250.0)]
    #[case(50.0, -30.0)]
    #[case(99.0, 1.0)]
    #[case(100.0, 0.0)]
    #[case(100.0, -500.0)]
    #[case(37.5, 62.5)]
    fn test_apply_battery_level_invariant(#[case] level: f64, #[case] net: f64) {
        let capacity = Energy(100.0);
        let mut state = battery(level);
        let flow = apply_battery(Energy(net), &mut state, capacity, EFFICIENCY, EFFICIENCY);
        assert!(state.battery_level >= Energy::ZERO);
        assert!(state.battery_level <= capacity);
        assert!(flow.wasted >= Energy::ZERO);
        assert!(flow.missing >= Energy::ZERO);

        // Everything not stored or delivered is accounted for as wasted or missing
        assert_approx_eq!(
            f64,
            flow.flow.value() + flow.wasted.value() - flow.missing.value(),
            net,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_apply_methane_from_inflow_and_store() {
        let mut state = methane(1000.0);
        // 90 MW electrical at 0.45 efficiency needs 200 MWh of fuel; 90 MWh comes from inflow
        let delivered = apply_methane(
            Power(90.0),
            &mut state,
            Energy(90.0),
            Energy(10_000.0),
            Dimensionless(0.45),
        );
        assert_eq!(delivered, Power(90.0));
        assert_approx_eq!(f64, state.methane_level.value(), 890.0, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_methane_insufficient_fuel() {
        let mut state = methane(10.0);
        let delivered = apply_methane(
            Power(90.0),
            &mut state,
            Energy(90.0),
            Energy(10_000.0),
            Dimensionless(0.45),
        );
        assert_approx_eq!(f64, delivered.value(), 45.0, epsilon = 1e-9);
        assert_eq!(state.methane_level, Energy::ZERO);
    }

    #[test]
    fn test_apply_methane_nothing_requested() {
        let mut state = methane(10.0);
        let delivered = apply_methane(
            Power::ZERO,
            &mut state,
            Energy(90.0),
            Energy(10_000.0),
            Dimensionless(0.45),
        );
        assert_eq!(delivered, Power::ZERO);
        assert_eq!(state.methane_level, Energy(100.0));
    }

    #[test]
    fn test_apply_methane_overflow_discarded() {
        let mut state = methane(9_950.0);
        let delivered = apply_methane(
            Power::ZERO,
            &mut state,
            Energy(90.0),
            Energy(10_000.0),
            Dimensionless(0.45),
        );
        assert_eq!(delivered, Power::ZERO);
        assert_eq!(state.methane_level, Energy(10_000.0));
    }
}
