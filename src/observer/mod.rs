pub mod location;
pub mod mount;
pub mod view;
pub mod worker;

pub use location::{trackable_unit, PageSnapshot, TrackableUnit};
pub use mount::{wait_for_mount, MountPolicy, StdoutSurface, Surface};
pub use view::ObservedView;
pub use worker::{ObserverConfig, UnitObserver};
