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

//! The document every batch replicates.
//!
//! A run reads exactly one JSON object from its input, converts it to BSON
//! once, and hands every worker the same [`SharedDocument`].  The handle only
//! exposes `&Document`, so no worker can change what another worker inserts.

use std::fmt;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use mongodb::bson::Bson;
use mongodb::bson::Document;
use serde_json::Value;
use tracing::debug;

use crate::DecodeError;
use crate::Error;
use crate::Result;

/// Where the document comes from; `-` selects standard input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Stdin,
    Path(PathBuf),
}

impl FromStr for Input {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s == "-" {
            Input::Stdin
        } else {
            Input::Path(PathBuf::from(s))
        })
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Stdin => f.write_str("-"),
            Input::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Read-only handle to the decoded document, cheap to clone across workers
#[derive(Clone, Debug)]
pub struct SharedDocument {
    doc: Arc<Document>,
    encoded_len: usize,
}

impl SharedDocument {
    pub fn new(doc: Document) -> Result<Self> {
        let encoded_len = mongodb::bson::to_vec(&doc)
            .map_err(DecodeError::from)?
            .len();
        Ok(Self {
            doc: Arc::new(doc),
            encoded_len,
        })
    }

    pub fn as_document(&self) -> &Document {
        &self.doc
    }

    /// Size of the BSON encoding in bytes
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }
}

/// A decoded document together with how long decoding took
#[derive(Debug)]
pub struct Loaded {
    pub document: SharedDocument,
    pub parse_time: Duration,
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode the first JSON value from `reader`.  Anything after it is ignored.
pub fn from_reader<R: Read>(reader: R) -> Result<Loaded> {
    let start = Instant::now();
    let mut values = serde_json::Deserializer::from_reader(reader).into_iter::<Value>();
    let value = values.next().ok_or(Error::EmptyInput)??;

    let kind = json_kind(&value);
    let doc = match Bson::try_from(value).map_err(DecodeError::from)? {
        Bson::Document(doc) => doc,
        _ => return Err(DecodeError::NotAnObject(kind).into()),
    };

    let document = SharedDocument::new(doc)?;
    let parse_time = start.elapsed();
    debug!(
        parse_secs = parse_time.as_secs_f64(),
        bytes = document.encoded_len(),
        "document parsed"
    );
    Ok(Loaded {
        document,
        parse_time,
    })
}

/// Open `input` and decode its first document.  Blocks on I/O.
pub fn load(input: &Input) -> Result<Loaded> {
    match input {
        Input::Stdin => from_reader(io::stdin().lock()),
        Input::Path(path) => {
            let file = File::open(path).map_err(|source| Error::InputUnavailable {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "opened input");
            from_reader(BufReader::new(file))
        }
    }
}
