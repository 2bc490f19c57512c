//! Entities used by unit tests of the data and specification layers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;

use super::postgres::PgRecord;
use super::{attach_children, ChildLoader, DataError, Entity, Includes, Record};
use crate::specification::FieldValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub qty: i64,
    pub note: Option<String>,
    #[serde(skip)]
    #[sqlx(skip)]
    pub parts: Vec<Part>,
}

impl Widget {
    pub fn new(name: &str, qty: i64, note: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            qty,
            note: note.map(str::to_string),
            parts: Vec::new(),
        }
    }
}

impl Entity for Widget {
    const NAME: &'static str = "widget";
    const FIELDS: &'static [&'static str] = &["id", "name", "qty", "note"];
    const RELATIONS: &'static [&'static str] = &["parts"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "name" => self.name.as_str().into(),
            "qty" => self.qty.into(),
            "note" => self.note.as_deref().into(),
            _ => return None,
        })
    }
}

#[async_trait]
impl Includes for Widget {
    async fn load_includes<L: ChildLoader>(
        items: &mut [Self],
        includes: &[&'static str],
        loader: &L,
    ) -> Result<(), DataError> {
        for include in includes {
            match *include {
                "parts" => {
                    let ids = items.iter().map(|w| w.id).collect();
                    let parts = loader.load_children::<Part>("widget_id", ids).await?;
                    attach_children(items, parts, |p| p.widget_id, |w, p| w.parts = p);
                }
                other => return Err(DataError::unknown_include::<Self>(other)),
            }
        }
        Ok(())
    }
}

impl PgRecord for Widget {
    const TABLE: &'static str = "widgets";
    const COLUMNS: &'static [&'static str] = &["id", "name", "qty", "note"];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.qty)
            .push_bind(self.note.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Part {
    pub id: Uuid,
    pub widget_id: Uuid,
    pub name: String,
}

impl Part {
    pub fn new(widget_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            widget_id,
            name: name.to_string(),
        }
    }
}

impl Entity for Part {
    const NAME: &'static str = "part";
    const FIELDS: &'static [&'static str] = &["id", "widget_id", "name"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "widget_id" => self.widget_id.into(),
            "name" => self.name.as_str().into(),
            _ => return None,
        })
    }
}

impl Includes for Part {}

impl PgRecord for Part {
    const TABLE: &'static str = "parts";
    const COLUMNS: &'static [&'static str] = &["id", "widget_id", "name"];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.widget_id)
            .push_bind(self.name.clone());
    }
}

/// Loader with no stored children
pub struct NoChildren;

#[async_trait]
impl ChildLoader for NoChildren {
    async fn load_children<C: Record>(
        &self,
        _foreign_key: &'static str,
        _parent_ids: Vec<Uuid>,
    ) -> Result<Vec<C>, DataError> {
        Ok(Vec::new())
    }
}
