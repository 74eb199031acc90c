//! Functions and types used to handle incoming events.
//!
//! Handlers are plain closures registered on a [`Socket`]. They are called one after the
//! other on the dispatcher task of the [`Client`](crate::Client), in the order the packets
//! were received and, for a given event, in the order the handlers were registered.
//! A handler should not block, spawn a task for any long running work.
use std::{collections::HashMap, sync::Arc};

use socketioxide_core::{PayloadValue, Str};

use crate::{client::ClientEvent, socket::DisconnectReason, socket::Socket};

mod event;

pub use event::Event;
pub(crate) use event::AckSender;

pub(crate) type BoxedMessageHandler = Arc<dyn Fn(&Socket, Event) + Send + Sync>;
pub(crate) type BoxedAnyHandler = Arc<dyn Fn(&Socket, &Event) + Send + Sync>;
pub(crate) type BoxedConnectHandler = Arc<dyn Fn(&Socket) + Send + Sync>;
pub(crate) type BoxedDisconnectHandler = Arc<dyn Fn(&Socket, DisconnectReason) + Send + Sync>;
pub(crate) type BoxedConnectErrorHandler = Arc<dyn Fn(&Socket, &PayloadValue) + Send + Sync>;
pub(crate) type BoxedClientEventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// The handlers of a namespace socket.
///
/// Handler lists are cloned out of the registry before being called
/// so a handler can register or remove other handlers.
#[derive(Default)]
pub(crate) struct Handlers {
    pub events: HashMap<Str, Vec<BoxedMessageHandler>>,
    pub any: Vec<BoxedAnyHandler>,
    pub connect: Vec<BoxedConnectHandler>,
    pub disconnect: Vec<BoxedDisconnectHandler>,
    pub connect_error: Vec<BoxedConnectErrorHandler>,
}

impl Handlers {
    pub fn clear(&mut self) {
        self.events.clear();
        self.any.clear();
        self.connect.clear();
        self.disconnect.clear();
        self.connect_error.clear();
    }
}
