//! Mechanism factories
//!
//! Factories are plain values the caller constructs and passes to whatever
//! negotiates mechanisms; there is no process-wide registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::callback::CallbackHandler;
use crate::client::ClientExchange;
use crate::server::ServerExchange;

/// SASL mechanism name
pub const MECHANISM_NAME: &str = "OAUTHBEARER";

/// Connection properties handed to factories
pub type SaslProperties = HashMap<String, String>;

/// Creates server exchanges for the mechanisms it supports
pub trait SaslServerFactory: Send + Sync {
    type Exchange;

    /// Mechanisms this factory offers under `properties`
    fn mechanism_names(&self, properties: &SaslProperties) -> Vec<&'static str>;

    /// A new exchange, or `None` if `mechanism` is not supported
    fn create_server(
        &self,
        mechanism: &str,
        protocol: &str,
        server_name: &str,
        properties: &SaslProperties,
        handler: Arc<dyn CallbackHandler>,
    ) -> Option<Self::Exchange>;
}

/// Creates client exchanges for the mechanisms it supports
pub trait SaslClientFactory: Send + Sync {
    type Exchange;

    fn mechanism_names(&self, properties: &SaslProperties) -> Vec<&'static str>;

    /// A new exchange for the first supported entry of `mechanisms`, or
    /// `None` if none is supported
    fn create_client(
        &self,
        mechanisms: &[&str],
        authorization_id: Option<&str>,
        protocol: &str,
        server_name: &str,
        properties: &SaslProperties,
        handler: Arc<dyn CallbackHandler>,
    ) -> Option<Self::Exchange>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OAuthBearerServerFactory;

impl SaslServerFactory for OAuthBearerServerFactory {
    type Exchange = ServerExchange;

    fn mechanism_names(&self, _properties: &SaslProperties) -> Vec<&'static str> {
        vec![MECHANISM_NAME]
    }

    fn create_server(
        &self,
        mechanism: &str,
        protocol: &str,
        server_name: &str,
        properties: &SaslProperties,
        handler: Arc<dyn CallbackHandler>,
    ) -> Option<ServerExchange> {
        if !self.mechanism_names(properties).contains(&mechanism) {
            return None;
        }
        debug!(protocol, server_name, "Creating OAUTHBEARER server exchange");
        Some(ServerExchange::new(handler))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OAuthBearerClientFactory;

impl SaslClientFactory for OAuthBearerClientFactory {
    type Exchange = ClientExchange;

    fn mechanism_names(&self, _properties: &SaslProperties) -> Vec<&'static str> {
        vec![MECHANISM_NAME]
    }

    fn create_client(
        &self,
        mechanisms: &[&str],
        authorization_id: Option<&str>,
        protocol: &str,
        server_name: &str,
        properties: &SaslProperties,
        handler: Arc<dyn CallbackHandler>,
    ) -> Option<ClientExchange> {
        let supported = self.mechanism_names(properties);
        if !mechanisms.iter().any(|m| supported.contains(m)) {
            return None;
        }

        debug!(protocol, server_name, "Creating OAUTHBEARER client exchange");
        let client = ClientExchange::new(handler);
        Some(match authorization_id {
            Some(id) => client.with_authorization_id(id),
            None => client,
        })
    }
}
