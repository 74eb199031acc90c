//! A string based api, for bindings where payloads are handled as json strings.
use serde_json::Value;
use socketioxide_core::{PayloadValue, Str};

use crate::{
    client::Client,
    errors::SocketError,
    handler::Event,
    socket::Socket,
};

impl Socket {
    /// Register a handler receiving the first argument of the event serialized as json,
    /// or `{}` if the event has no argument.
    pub fn on_json<F>(&self, event: impl Into<Str>, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on(event, move |_: &Socket, event: Event| handler(first_arg_json(&event.args)));
    }

    /// Emit an event with json string arguments.
    ///
    /// Each item that is a json object is sent as an object,
    /// any other item is sent as a plain string.
    pub fn emit_json<I, S>(&self, event: impl Into<Str>, items: I) -> Result<(), SocketError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = items.into_iter().map(|item| json_arg(item.as_ref())).collect();
        self.emit(event, args)
    }
}

impl Client {
    /// See [`Socket::on_json`].
    pub fn on_json<F>(&self, event: impl Into<Str>, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.socket().on_json(event, handler)
    }

    /// See [`Socket::emit_json`].
    pub fn emit_json<I, S>(&self, event: impl Into<Str>, items: I) -> Result<(), SocketError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.socket().emit_json(event, items)
    }
}

fn first_arg_json(args: &[PayloadValue]) -> String {
    match args.first() {
        Some(arg) => arg.to_json().to_string(),
        None => "{}".to_string(),
    }
}

fn json_arg(item: &str) -> PayloadValue {
    match serde_json::from_str::<Value>(item) {
        Ok(value @ Value::Object(_)) => value.into(),
        _ => item.into(),
    }
}
