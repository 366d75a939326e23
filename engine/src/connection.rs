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

use async_trait::async_trait;
use mongodb::bson::Bson;
use mongodb::bson::Document;

use crate::Error;
use crate::Result;

/// Server acknowledgment of one bulk write
#[derive(Clone, Debug, PartialEq)]
pub struct Ack {
    pub inserted: usize,
    /// The server's reply, `None` when the batch never left the process
    pub reply: Option<Document>,
}

impl Ack {
    /// A batch answered without a round trip
    pub fn local(inserted: usize) -> Self {
        Self {
            inserted,
            reply: None,
        }
    }

    /// Interpret an `insert` command reply.  Write errors and write concern
    /// errors fail the batch, keeping the count of documents the server did
    /// apply.
    pub fn from_reply(reply: Document) -> Result<Self> {
        let inserted = match reply.get("n") {
            Some(Bson::Int32(n)) => usize::try_from(*n).unwrap_or(0),
            Some(Bson::Int64(n)) => usize::try_from(*n).unwrap_or(0),
            _ => 0,
        };
        if let Some(message) = write_failure(&reply) {
            return Err(Error::BulkWrite { inserted, message });
        }
        Ok(Self {
            inserted,
            reply: Some(reply),
        })
    }

    /// The reply rendered as canonical extended JSON
    pub fn to_extended_json(&self) -> Option<String> {
        self.reply.as_ref().map(|reply| {
            Bson::Document(reply.clone())
                .into_canonical_extjson()
                .to_string()
        })
    }
}

fn errmsg(doc: Option<&Document>, fallback: &str) -> String {
    let code = doc.and_then(|d| d.get("code")).map(ToString::to_string);
    let msg = doc
        .and_then(|d| d.get_str("errmsg").ok())
        .unwrap_or(fallback);
    match code {
        Some(code) => format!("{msg} (code {code})"),
        None => msg.to_string(),
    }
}

fn write_failure(reply: &Document) -> Option<String> {
    if let Ok(errors) = reply.get_array("writeErrors")
        && !errors.is_empty()
    {
        let first = errmsg(errors[0].as_document(), "write error");
        return Some(match errors.len() {
            1 => first,
            n => format!("{first} and {} more write error(s)", n - 1),
        });
    }
    reply
        .get_document("writeConcernError")
        .ok()
        .map(|wce| errmsg(Some(wce), "write concern error"))
}

/// One live session with the database.  Not shared: the pool hands each
/// connection to a single worker at a time.
#[async_trait]
pub trait Connection: Send + Sized + 'static {
    /// Insert `count` copies of `document` in a single round trip
    async fn bulk_insert(&mut self, document: &Document, count: usize) -> Result<Ack>;

    async fn close(self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_ack_reply() -> anyhow::Result<()> {
        let ack = Ack::from_reply(doc! { "n": 50, "ok": 1 })?;
        assert_eq!(50, ack.inserted);
        assert_eq!(
            Some(r#"{"n":{"$numberInt":"50"},"ok":{"$numberInt":"1"}}"#.to_string()),
            ack.to_extended_json()
        );
        Ok(())
    }

    #[test]
    fn test_local_ack_has_no_reply() {
        let ack = Ack::local(0);
        assert_eq!(0, ack.inserted);
        assert_eq!(None, ack.to_extended_json());
    }

    #[test]
    fn test_write_errors_keep_partial_count() {
        let reply = doc! {
            "n": 3,
            "ok": 1.0,
            "writeErrors": [
                { "index": 3, "code": 11000, "errmsg": "E11000 duplicate key error" },
            ],
        };
        match Ack::from_reply(reply) {
            Err(Error::BulkWrite { inserted, message }) => {
                assert_eq!(3, inserted);
                assert_eq!("E11000 duplicate key error (code 11000)", message);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_write_concern_error() {
        let reply = doc! {
            "n": 10,
            "ok": 1.0,
            "writeConcernError": { "code": 64, "errmsg": "waiting for replication timed out" },
        };
        let err = Ack::from_reply(reply).unwrap_err();
        assert_eq!(10, err.inserted());
        assert!(err.to_string().contains("waiting for replication timed out"));
    }
}
