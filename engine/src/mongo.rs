// Copyright 2025 Maurice S. Barnum
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! MongoDB-backed connections.
//!
//! The driver keeps its own socket pool per `Client`.  Each pooled
//! [`MongoConnection`] is a separate `Client` capped at one socket, so the
//! benchmark pool, not the driver, decides how many sockets are in use.

use async_trait::async_trait;
use mongodb::Client;
use mongodb::Database;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use tracing::debug;
use tracing::info;

use crate::Result;
use crate::config::RunConfig;
use crate::connection::Ack;
use crate::connection::Connection;
use crate::pool::ConnectionFactory;

pub const APP_NAME: &str = "mongocat";

#[derive(Clone, Debug)]
pub struct MongoConnectionFactory {
    options: ClientOptions,
    database: String,
    collection: String,
}

impl MongoConnectionFactory {
    /// Parse the source URI.  A malformed URI fails here, before any worker
    /// starts.
    pub async fn new(config: &RunConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.source_uri()).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.max_pool_size = Some(1);
        Ok(Self {
            options,
            database: config.database().to_string(),
            collection: config.collection().to_string(),
        })
    }
}

#[async_trait]
impl ConnectionFactory for MongoConnectionFactory {
    type Connection = MongoConnection;

    async fn create(&self, id: usize) -> Result<MongoConnection> {
        let client = Client::with_options(self.options.clone())?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        info!(id, hosts = ?self.options.hosts, "connected");

        let database = client.database(&self.database);
        Ok(MongoConnection {
            id,
            client,
            database,
            collection: self.collection.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MongoConnection {
    id: usize,
    client: Client,
    database: Database,
    collection: String,
}

impl MongoConnection {
    fn insert_command(&self, document: &Document, count: usize) -> Document {
        doc! {
            "insert": self.collection.as_str(),
            "documents": vec![Bson::Document(document.clone()); count],
            "ordered": true,
        }
    }
}

#[async_trait]
impl Connection for MongoConnection {
    async fn bulk_insert(&mut self, document: &Document, count: usize) -> Result<Ack> {
        // The server rejects an empty insert; nothing to send.
        if count == 0 {
            return Ok(Ack::local(0));
        }
        // One `insert` command is one round trip, and its reply carries the
        // server's own count and write errors.
        let reply = self
            .database
            .run_command(self.insert_command(document, count))
            .await?;
        Ack::from_reply(reply)
    }

    async fn close(self) -> Result<()> {
        debug!(id = self.id, "closing connection");
        self.client.shutdown().await;
        Ok(())
    }
}
