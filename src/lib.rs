//! Dark photons: truth and reconstruction studies of displaced lepton jets
//!
//!
//! # Introduction (for the physicist)
//!
//! Hidden sector models predict dark photons which decay, after a measurable
//! flight distance, into collimated pairs of leptons. These studies run over
//! simulated samples of such decays and characterize them at truth level
//! (kinematics, decay lengths, opening angles and the 2m/pT approximation
//! thereof), then measure how often reconstructed lepton jets match them.
//!
//!
//! # Introduction (for the computer guy)
//!
//! Every study follows the same recipe:
//!
//! * open a sample, a file of events in JSON lines format,
//! * optionally go through it once to discover the histogram ranges,
//! * go through it again, selecting particles and filling accumulators,
//! * freeze the accumulators into named records,
//! * then store these records on disk and draw them.
//!
//! The [`aggregator::EventAggregator`] drives this recipe, the modules of
//! [`analysis`] say what to do with each event, and finished runs can later be
//! compared by the [`overlay`] module without touching the samples again.

#![warn(missing_docs)]

pub mod aggregator;
pub mod analysis;
pub mod candidates;
pub mod commands;
pub mod config;
pub mod efficiency;
pub mod evcut;
pub mod event;
pub mod histogram;
pub mod momentum;
pub mod numeric;
pub mod output;
pub mod overlay;
pub mod range;
pub mod render;
pub mod source;
pub mod store;

/// We'll use eyre's type-erased result type throughout the application
pub type Result<T, E = eyre::Report> = std::result::Result<T, E>;
