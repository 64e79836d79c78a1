#![doc(issue_tracker_base_url = "https://github.com/chainbound/l2tap/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod ip;
pub mod mac;

pub use ip::{HostAllocator, SubnetAllocator};
pub use mac::MacAddr;
