//! Device tracking core: live tracker sessions, simulated motion, realtime
//! change delivery and the tracking map model

pub mod activity_log;
pub mod device_list;
pub mod keep_awake;
pub mod location;
pub mod map_view;
pub mod publisher;
pub mod realtime;
pub mod session;
pub mod simulator;
pub mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use keep_awake::{ClientKeepAwake, KeepAwake};
pub use location::{LocationSource, PushLocationSource, WatchOptions};
pub use publisher::PositionPublisher;
pub use realtime::{ChangeFeed, Subscription};
pub use session::TrackingSession;
pub use simulator::Simulator;
pub use viewer::TrackViewer;
