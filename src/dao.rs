use crate::model::Database;
use crate::storage::Bucket;
use crate::util::BoxResult;

pub const JSON: &str = "application/json";

/// The JSON database document stored under one object key.
pub struct Dao<B> {
    bucket: B,
    key: String,
}

impl<B: Bucket> Dao<B> {
    pub fn new(bucket: B, key: &str) -> Self {
        Dao {
            bucket,
            key: key.to_string(),
        }
    }

    pub fn bucket(&self) -> &B {
        &self.bucket
    }

    /// Reads the whole database. A missing document is an empty database.
    pub async fn load(&self) -> BoxResult<Database> {
        match self.bucket.get(&self.key).await? {
            Some(bytes) => {
                let db = Database::from_slice(&bytes)?;
                log::info!("loaded {} records from {}/{}", db.len(), self.bucket.name(), self.key);
                Ok(db)
            }
            None => {
                log::warn!("no database at {}/{}, starting empty", self.bucket.name(), self.key);
                Ok(Database::new())
            }
        }
    }

    /// Writes `db` back. With `changed` only those keys are written: the
    /// stored document is re-read and each listed key is replaced by the
    /// in-memory record, or removed when `db` no longer has it.
    pub async fn save(&self, db: &Database, changed: Option<&[String]>) -> BoxResult<()> {
        let out = match changed {
            None => db.clone(),
            Some(keys) => {
                let mut stored = self.load().await?;
                for key in keys {
                    match db.get(key) {
                        Some(record) => {
                            stored.insert(key.clone(), record.clone());
                        }
                        None => {
                            stored.remove(key);
                        }
                    }
                }
                stored
            }
        };
        self.bucket.put(&self.key, out.to_vec()?, JSON).await?;
        match changed {
            Some(keys) => log::info!("saved {:?} to {}/{}", keys, self.bucket.name(), self.key),
            None => log::info!("saved {} records to {}/{}", out.len(), self.bucket.name(), self.key),
        }
        Ok(())
    }
}
