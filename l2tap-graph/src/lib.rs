#![doc(issue_tracker_base_url = "https://github.com/chainbound/l2tap/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The experiment graph consumed by the tap insertion pass.
//!
//! A [`Graph`] owns every [`Vertex`] and [`Edge`] and is passed explicitly to any operation that
//! needs to look something up or change the topology; vertices hold no reference back to it.
//! Behavior is attached to vertices through [`Capability`] tags.

pub mod edge;
pub mod graph;
pub mod schedule;
pub mod vertex;

pub use edge::{CollectorRef, Collectors, Edge, EdgeId, Qos};
pub use graph::{Error, Graph, Result};
pub use schedule::ScheduleEntry;
pub use vertex::{Capability, Interface, Vertex, VertexId};
