//! Event loop shared by every analysis
//!
//! All analyses follow the same recipe. Events are read from a source. Ranges
//! may be discovered in an optional first pass, after which the accumulators
//! are configured. A filling pass follows, then everything is finalized into
//! named records. The [`EventAggregator`] drives this recipe and checks that
//! its phases happen in order. An [`Analysis`] only says what to do with each
//! event at each phase.

use crate::{
    event::{Event, SchemaError},
    source::EventSource,
    store::Record,
    Result,
};
use eyre::{ensure, eyre};
use std::collections::BTreeMap;

/// What an analysis does at each phase of the event loop
pub trait Analysis {
    /// Truth that this analysis needs a first pass to discover its ranges
    fn needs_first_pass(&self) -> bool {
        false
    }

    /// First pass: record whatever is needed to infer ranges
    fn collect(&mut self, _event: &Event) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Fix the accumulators' binning, once every first-pass value is known
    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    /// Filling pass: accumulate one event
    ///
    /// A schema error must be detected before any accumulator is touched, so
    /// that a skipped event leaves no trace.
    fn fill(&mut self, event: &Event) -> Result<(), SchemaError>;

    /// Freeze the accumulators and turn them into named records
    fn finalize(self) -> Result<Outcome>;
}

/// Output of a finished analysis
#[derive(Debug, Default)]
pub struct Outcome {
    /// Finalized records, to be stored
    pub records: Vec<Record>,

    /// Human-readable summary, stored as run metadata
    pub notes: BTreeMap<String, String>,
}

/// Phases of the event loop, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Source opened, nothing read yet
    Open,

    /// First pass over the events done
    CollectPassOne,

    /// Accumulators configured
    Configure,

    /// Filling pass over the events done
    FillPassTwo,

    /// Accumulators finalized
    Finalize,

    /// Source released
    Close,
}

/// Event counts of one run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Events accumulated in the filling pass
    pub events: usize,

    /// Events skipped as malformed in the filling pass
    pub skipped: usize,
}

/// Driver of an analysis over an event source
pub struct EventAggregator<A: Analysis> {
    source: Option<EventSource>,
    analysis: Option<A>,
    phase: Phase,
    stats: RunStats,
}
//
impl<A: Analysis> EventAggregator<A> {
    /// Prepare to run an analysis over an opened source
    pub fn new(source: EventSource, analysis: A) -> Self {
        Self {
            source: Some(source),
            analysis: Some(analysis),
            phase: Phase::Open,
            stats: RunStats::default(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Event counts so far
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Run every phase in order
    pub fn run(mut self) -> Result<(Outcome, RunStats)> {
        if self.needs_first_pass()? {
            self.collect_pass_one()?;
        }
        self.configure()?;
        self.fill_pass_two()?;
        let outcome = self.finalize()?;
        let stats = self.close()?;
        Ok((outcome, stats))
    }

    /// Truth that the analysis wants a first pass
    pub fn needs_first_pass(&self) -> Result<bool> {
        Ok(self.analysis()?.needs_first_pass())
    }

    /// First pass over the events
    pub fn collect_pass_one(&mut self) -> Result<()> {
        self.expect_phase(&[Phase::Open], Phase::CollectPassOne)?;
        ensure!(
            self.needs_first_pass()?,
            "This analysis has no range to discover"
        );
        let (source, analysis) = self.parts()?;
        let (events, _) = event_loop(source, |event| analysis.collect(event))?;
        log::debug!("First pass over {} saw {events} events", source.path().display());
        source.rewind()?;
        self.phase = Phase::CollectPassOne;
        Ok(())
    }

    /// Fix the accumulators' binning
    pub fn configure(&mut self) -> Result<()> {
        let previous = if self.needs_first_pass()? {
            Phase::CollectPassOne
        } else {
            Phase::Open
        };
        self.expect_phase(&[previous], Phase::Configure)?;
        self.analysis_mut()?.configure()?;
        self.phase = Phase::Configure;
        Ok(())
    }

    /// Filling pass over the events
    pub fn fill_pass_two(&mut self) -> Result<()> {
        self.expect_phase(&[Phase::Configure], Phase::FillPassTwo)?;
        let (source, analysis) = self.parts()?;
        let (events, skipped) = event_loop(source, |event| analysis.fill(event))?;
        log::info!(
            "Accumulated {events} events from {} ({skipped} skipped)",
            source.path().display()
        );
        self.stats = RunStats { events, skipped };
        self.phase = Phase::FillPassTwo;
        Ok(())
    }

    /// Finalize the accumulators
    pub fn finalize(&mut self) -> Result<Outcome> {
        self.expect_phase(&[Phase::FillPassTwo], Phase::Finalize)?;
        let analysis = self
            .analysis
            .take()
            .ok_or_else(|| eyre!("Analysis was already finalized"))?;
        let mut outcome = analysis.finalize()?;
        outcome
            .notes
            .insert("events".to_owned(), self.stats.events.to_string());
        outcome
            .notes
            .insert("skipped_events".to_owned(), self.stats.skipped.to_string());
        self.phase = Phase::Finalize;
        Ok(outcome)
    }

    /// Release the event source
    pub fn close(&mut self) -> Result<RunStats> {
        self.expect_phase(&[Phase::Finalize], Phase::Close)?;
        self.source = None;
        self.phase = Phase::Close;
        Ok(self.stats)
    }

    fn expect_phase(&self, allowed: &[Phase], next: Phase) -> Result<()> {
        ensure!(
            allowed.contains(&self.phase),
            "Cannot enter phase {next:?} from phase {:?}",
            self.phase
        );
        Ok(())
    }

    fn analysis(&self) -> Result<&A> {
        self.analysis
            .as_ref()
            .ok_or_else(|| eyre!("Analysis was already finalized"))
    }

    fn analysis_mut(&mut self) -> Result<&mut A> {
        self.analysis
            .as_mut()
            .ok_or_else(|| eyre!("Analysis was already finalized"))
    }

    fn parts(&mut self) -> Result<(&mut EventSource, &mut A)> {
        match (self.source.as_mut(), self.analysis.as_mut()) {
            (Some(source), Some(analysis)) => Ok((source, analysis)),
            _ => Err(eyre!("Event source was already closed")),
        }
    }
}

/// Feed every event of a source to some per-event processing, applying the
/// source's malformed event policy to schema errors from either side
///
/// Returns how many events were processed and how many were skipped.
fn event_loop(
    source: &mut EventSource,
    mut process: impl FnMut(&Event) -> Result<(), SchemaError>,
) -> Result<(usize, usize)> {
    let mut processed = 0;
    let mut rejected = 0;
    while let Some(event) = source.next_event()? {
        match process(&event) {
            Ok(()) => processed += 1,
            Err(error) => {
                source.policy().handle(error, source.location())?;
                rejected += 1;
            }
        }
    }
    Ok((processed, rejected + source.skipped()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MismatchPolicy,
        histogram::{Binning, Hist1D, Labels},
        range::RangePolicy,
    };
    use std::io::Write;

    /// Histograms the number of truth particles per event
    #[derive(Default)]
    struct Multiplicity {
        two_pass: bool,
        seen: Vec<crate::numeric::Float>,
        hist: Option<Hist1D>,
        refuse_empty: bool,
    }
    //
    impl Analysis for Multiplicity {
        fn needs_first_pass(&self) -> bool {
            self.two_pass
        }

        fn collect(&mut self, event: &Event) -> Result<(), SchemaError> {
            self.seen.push(event.num_truth() as _);
            Ok(())
        }

        fn configure(&mut self) -> Result<()> {
            let (lo, hi) = if self.two_pass {
                RangePolicy::from_zero(2., (0., 1.)).infer(&self.seen)
            } else {
                (0., 10.)
            };
            self.hist = Some(Hist1D::new("multiplicity", Labels::default(), Binning::new(5, lo, hi)));
            Ok(())
        }

        fn fill(&mut self, event: &Event) -> Result<(), SchemaError> {
            if self.refuse_empty && event.num_truth() == 0 {
                return Err(SchemaError::MissingBranch("truthPdgId"));
            }
            let hist = self.hist.as_mut().expect("configured before filling");
            hist.fill(event.num_truth() as _);
            Ok(())
        }

        fn finalize(self) -> Result<Outcome> {
            let mut hist = self.hist.expect("configured before finalizing");
            hist.finalize(false);
            Ok(Outcome {
                records: vec![hist.into()],
                notes: BTreeMap::new(),
            })
        }
    }

    fn sample(policy: MismatchPolicy) -> (tempfile::NamedTempFile, EventSource) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for n in [1, 2, 0, 4] {
            let ids = vec![11; n];
            let zeros = vec![0.0; n];
            let barcodes = vec![0; n];
            let row = serde_json::json!({
                "truthPdgId": ids, "truthPt": zeros, "truthEta": zeros, "truthPhi": zeros,
                "truthE": zeros, "truthDecayVtx_x": zeros, "truthDecayVtx_y": zeros,
                "truthDecayVtx_z": zeros, "truthBarcode": barcodes,
            });
            writeln!(file, "{row}").unwrap();
        }
        let source = EventSource::open(file.path(), policy).unwrap();
        (file, source)
    }

    #[test]
    fn one_pass_run() {
        let (_file, source) = sample(MismatchPolicy::Skip);
        let (outcome, stats) = EventAggregator::new(source, Multiplicity::default())
            .run()
            .unwrap();
        assert_eq!(stats, RunStats { events: 4, skipped: 0 });
        assert_eq!(outcome.notes["events"], "4");
        let Record::Hist1d(hist) = &outcome.records[0] else {
            panic!("expected a 1D histogram");
        };
        assert_eq!(hist.counts(), &[2, 1, 1, 0, 0]);
    }

    #[test]
    fn two_pass_run_discovers_range() {
        let (_file, source) = sample(MismatchPolicy::Skip);
        let analysis = Multiplicity {
            two_pass: true,
            ..Multiplicity::default()
        };
        let (outcome, _) = EventAggregator::new(source, analysis).run().unwrap();
        let Record::Hist1d(hist) = &outcome.records[0] else {
            panic!("expected a 1D histogram");
        };
        assert_eq!(hist.binning.hi, 8.);
        assert_eq!(hist.fills(), 4);
        assert_eq!(hist.overflow(), 0);
    }

    #[test]
    fn phases_must_happen_in_order() {
        let (_file, source) = sample(MismatchPolicy::Skip);
        let mut aggregator = EventAggregator::new(source, Multiplicity::default());
        assert!(aggregator.fill_pass_two().is_err());
        assert!(aggregator.collect_pass_one().is_err());
        assert!(aggregator.finalize().is_err());
        aggregator.configure().unwrap();
        assert!(aggregator.configure().is_err());
        aggregator.fill_pass_two().unwrap();
        assert!(aggregator.close().is_err());
        aggregator.finalize().unwrap();
        assert!(aggregator.finalize().is_err());
        aggregator.close().unwrap();
        assert_eq!(aggregator.phase(), Phase::Close);
    }

    #[test]
    fn analysis_schema_errors_follow_policy() {
        let analysis = || Multiplicity {
            refuse_empty: true,
            ..Multiplicity::default()
        };

        let (_file, source) = sample(MismatchPolicy::Skip);
        let (_, stats) = EventAggregator::new(source, analysis()).run().unwrap();
        assert_eq!(stats, RunStats { events: 3, skipped: 1 });

        let (_file, source) = sample(MismatchPolicy::Abort);
        assert!(EventAggregator::new(source, analysis()).run().is_err());
    }
}
