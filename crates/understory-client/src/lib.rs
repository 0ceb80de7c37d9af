//! Client side of the analysis backend protocol: event bus, correlated
//! requests, refresh scheduling, context tracking and the graph view session

pub mod backend;
pub mod bus;
pub mod config;
pub mod context;
pub mod correlator;
pub mod protocol;
pub mod scheduler;
pub mod transport;
pub mod view;

pub use bus::EventBus;
pub use config::{ConfigError, ViewConfig, CONFIG_FILE};
pub use context::ContextTracker;
pub use correlator::{RequestCorrelator, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::{Correlated, EventKind, InboundEvent, OutboundRequest, ProtocolError};
pub use scheduler::{
    set_visibility, InFlight, Refresh, RefreshScheduler, Visibility, DEFAULT_REFRESH_INTERVAL,
    MIN_REFRESH_INTERVAL,
};
pub use transport::{ChannelTransport, RecordingTransport, Transport, TransportError};
pub use view::{GraphView, ViewSession, ViewStatus};
