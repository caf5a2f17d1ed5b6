//! Synchronous typed publish/subscribe over the closed set of
//! control-plane events and requests. Delivery happens on the publisher's
//! thread; handlers are registered once at startup.

use parking_lot::RwLock;

use super::events::{
    ChannelStatusEvent, ServerCommand, ServerEvent, ServerLoginRequest, ServerLoginResponse,
    ServerTokenBindRequest,
};

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
struct Topic<T> {
    handlers: RwLock<Vec<Handler<T>>>,
}

impl<T> Topic<T> {
    fn subscribe(&self, handler: Handler<T>) {
        self.handlers.write().push(handler);
    }

    fn post(&self, event: &T) {
        for handler in self.handlers.read().iter() {
            handler(event);
        }
    }
}

/// One topic per message type in the closed control-plane set.
#[derive(Default)]
pub struct SystemBus {
    commands: Topic<ServerCommand>,
    events: Topic<ServerEvent>,
    login_requests: Topic<ServerLoginRequest>,
    login_responses: Topic<ServerLoginResponse>,
    token_bind_requests: Topic<ServerTokenBindRequest>,
    channel_status: Topic<ChannelStatusEvent>,
}

macro_rules! topic_accessors {
    ($field:ident, $ty:ty, $sub:ident, $post:ident) => {
        pub fn $sub<F>(&self, handler: F)
        where
            F: Fn(&$ty) + Send + Sync + 'static,
        {
            self.$field.subscribe(Box::new(handler));
        }

        pub fn $post(&self, event: $ty) {
            self.$field.post(&event);
        }
    };
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    topic_accessors!(commands, ServerCommand, subscribe_command, post_command);
    topic_accessors!(events, ServerEvent, subscribe_event, post_event);
    topic_accessors!(
        login_requests,
        ServerLoginRequest,
        subscribe_login_request,
        post_login_request
    );
    topic_accessors!(
        login_responses,
        ServerLoginResponse,
        subscribe_login_response,
        post_login_response
    );
    topic_accessors!(
        token_bind_requests,
        ServerTokenBindRequest,
        subscribe_token_bind_request,
        post_token_bind_request
    );
    topic_accessors!(
        channel_status,
        ChannelStatusEvent,
        subscribe_channel_status,
        post_channel_status
    );
}
