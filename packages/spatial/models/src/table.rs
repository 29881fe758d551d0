//! Attribute tables and the read-only [`TableSource`] cursor.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::value::{FieldType, FieldValue, GroupKey};

/// Errors from attribute table manipulation.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A referenced field does not exist.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A field with this name already exists.
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// System-maintained fields cannot be removed.
    #[error("Cannot delete required field: {0}")]
    RequiredField(String),

    /// A row does not match the table's field count.
    #[error("Row has {actual} values but the table has {expected} fields")]
    RowLength {
        /// Number of fields in the table.
        expected: usize,
        /// Number of values in the offending row.
        actual: usize,
    },
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub field_type: FieldType,
    /// System-maintained field (e.g. `OBJECTID`). Required fields are not
    /// part of a layer's user-facing attribute set.
    pub required: bool,
}

impl Field {
    /// A regular, user-facing field.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// A system-maintained field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }
}

/// Read-only, row-ordered access to tabular data.
///
/// Implemented by in-memory tables, geometry layers, and lazily computed
/// tables such as a near table, so consumers can stream rows without caring
/// how they are produced.
pub trait TableSource {
    /// Column definitions, in row order.
    fn fields(&self) -> &[Field];

    /// Iterates rows in source order. Each row has one value per field.
    fn rows(&self) -> Box<dyn Iterator<Item = Cow<'_, [FieldValue]>> + '_>;

    /// Position of the named field, if present.
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Names of all non-required fields, in order.
    fn user_field_names(&self) -> Vec<String> {
        self.fields()
            .iter()
            .filter(|f| !f.required)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// An in-memory table of attribute rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    fields: Vec<Field>,
    rows: Vec<Vec<FieldValue>>,
}

impl AttributeTable {
    /// Creates an empty table with the given columns.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateField`] if two fields share a name.
    pub fn new(fields: Vec<Field>) -> Result<Self, TableError> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(TableError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self {
            fields,
            rows: Vec::new(),
        })
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowLength`] if the row width does not match.
    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), TableError> {
        if row.len() != self.fields.len() {
            return Err(TableError::RowLength {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// All rows.
    #[must_use]
    pub fn row_slice(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `field` in row `row`.
    #[must_use]
    pub fn value(&self, row: usize, field: &str) -> Option<&FieldValue> {
        let idx = self.field_index(field)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Resolves a field name to its column index.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownField`] if the field does not exist.
    pub fn require_field(&self, name: &str) -> Result<usize, TableError> {
        self.field_index(name)
            .ok_or_else(|| TableError::UnknownField(name.to_string()))
    }

    /// Inserts a column at `position`, filling existing rows with `fill`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateField`] if the name is taken.
    pub fn insert_field(
        &mut self,
        position: usize,
        field: Field,
        fill: &FieldValue,
    ) -> Result<(), TableError> {
        if self.field_index(&field.name).is_some() {
            return Err(TableError::DuplicateField(field.name));
        }
        let position = position.min(self.fields.len());
        self.fields.insert(position, field);
        for row in &mut self.rows {
            row.insert(position, fill.clone());
        }
        Ok(())
    }

    /// Appends a column, filling existing rows with `fill`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DuplicateField`] if the name is taken.
    pub fn add_field(&mut self, field: Field, fill: &FieldValue) -> Result<(), TableError> {
        self.insert_field(self.fields.len(), field, fill)
    }

    /// Removes a non-required column.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownField`] if missing, or
    /// [`TableError::RequiredField`] for system fields.
    pub fn delete_field(&mut self, name: &str) -> Result<(), TableError> {
        let idx = self.require_field(name)?;
        if self.fields[idx].required {
            return Err(TableError::RequiredField(name.to_string()));
        }
        self.fields.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        Ok(())
    }

    /// Copies `join_fields` from `other` onto this table, matching
    /// `key_field` here against `other_key` there.
    ///
    /// Rows without a match receive [`FieldValue::Null`]. When `other` has
    /// several rows for one key, the first wins.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownField`] if any referenced field is
    /// missing, or [`TableError::DuplicateField`] if a joined field name
    /// already exists here.
    pub fn join_field(
        &mut self,
        key_field: &str,
        other: &dyn TableSource,
        other_key: &str,
        join_fields: &[&str],
    ) -> Result<(), TableError> {
        let key_idx = self.require_field(key_field)?;
        let other_key_idx = other
            .field_index(other_key)
            .ok_or_else(|| TableError::UnknownField(other_key.to_string()))?;

        let mut joined = Vec::with_capacity(join_fields.len());
        for name in join_fields {
            let idx = other
                .field_index(name)
                .ok_or_else(|| TableError::UnknownField((*name).to_string()))?;
            if self.field_index(name).is_some() {
                return Err(TableError::DuplicateField((*name).to_string()));
            }
            joined.push((idx, other.fields()[idx].clone()));
        }

        let mut lookup: BTreeMap<GroupKey, Vec<FieldValue>> = BTreeMap::new();
        for row in other.rows() {
            lookup
                .entry(GroupKey(row[other_key_idx].clone()))
                .or_insert_with(|| joined.iter().map(|(idx, _)| row[*idx].clone()).collect());
        }

        for (_, field) in &joined {
            self.fields.push(Field::new(field.name.clone(), field.field_type));
        }
        for row in &mut self.rows {
            match lookup.get(&GroupKey(row[key_idx].clone())) {
                Some(values) => row.extend(values.iter().cloned()),
                None => row.extend(std::iter::repeat_n(FieldValue::Null, joined.len())),
            }
        }

        Ok(())
    }

    /// New table holding only the rows at `indices`, in the given order.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            fields: self.fields.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}

impl TableSource for AttributeTable {
    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn rows(&self) -> Box<dyn Iterator<Item = Cow<'_, [FieldValue]>> + '_> {
        Box::new(self.rows.iter().map(|r| Cow::Borrowed(r.as_slice())))
    }
}
