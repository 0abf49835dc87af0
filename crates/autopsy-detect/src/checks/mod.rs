//! The standard check battery

mod cascade;
mod empty;
mod hallucination;
mod loops;
mod overflow;
mod retry;

pub use cascade::ErrorCascadeCheck;
pub use empty::EmptyResponseCheck;
pub use hallucination::HallucinatedToolCheck;
pub use loops::LoopCheck;
pub use overflow::ContextOverflowCheck;
pub use retry::RetryStormCheck;

#[cfg(test)]
pub(crate) fn run_check(
    check: &dyn crate::Check,
    trace: &autopsy_model::Trace,
    environment: &autopsy_model::Environment,
) -> (Vec<autopsy_model::Signal>, Vec<crate::DataGap>) {
    let mut scan = crate::Scan::new(trace, environment, &autopsy_model::ScanBudget::unlimited());
    let signals = check.run(&mut scan).expect("unlimited budget");
    (signals, scan.into_gaps())
}
