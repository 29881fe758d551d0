//! Summary statistics over any [`TableSource`], optionally grouped by a
//! case field.

use std::collections::BTreeMap;

use fire_map_spatial_models::{
    AttributeTable, Field, FieldType, FieldValue, GroupKey, TableSource,
};

use crate::SpatialError;

/// Name of the per-group row count column.
pub const FREQUENCY: &str = "FREQUENCY";

/// A summary statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    /// Sum of values.
    Sum,
    /// Largest value.
    Max,
    /// Smallest value.
    Min,
    /// Arithmetic mean.
    Mean,
    /// Number of non-null values.
    Count,
}

impl Statistic {
    /// Upper-case output prefix, e.g. `"MAX"`.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Mean => "MEAN",
            Self::Count => "COUNT",
        }
    }

    fn output_type(self, input: FieldType) -> FieldType {
        match self {
            Self::Count => FieldType::Integer,
            Self::Mean => FieldType::Double,
            Self::Sum | Self::Max | Self::Min => input,
        }
    }
}

/// A statistic applied to a named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticField {
    /// Input field.
    pub field: String,
    /// Statistic to compute.
    pub statistic: Statistic,
}

impl StatisticField {
    /// Pairs a field with a statistic.
    #[must_use]
    pub fn new(field: impl Into<String>, statistic: Statistic) -> Self {
        Self {
            field: field.into(),
            statistic,
        }
    }

    /// Output column name, e.g. `MAX_confidence`.
    #[must_use]
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.statistic.prefix(), self.field)
    }

    /// Output column name with a lower-case prefix, e.g. `max_confidence`.
    #[must_use]
    pub fn summary_name(&self) -> String {
        format!("{}_{}", self.statistic.prefix().to_lowercase(), self.field)
    }
}

/// Running state for one statistic over one group. Nulls are skipped.
#[derive(Debug, Clone, Default)]
pub(crate) struct Accumulator {
    count: u64,
    sum: f64,
    max: Option<f64>,
    min: Option<f64>,
}

impl Accumulator {
    pub(crate) fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
    }

    /// Final value, typed for the output column. Groups with no non-null
    /// inputs yield [`FieldValue::Null`] (except `Count`, which is 0).
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub(crate) fn finish(&self, statistic: Statistic, output_type: FieldType) -> FieldValue {
        let value = match statistic {
            Statistic::Count => {
                return FieldValue::Integer(i64::try_from(self.count).unwrap_or(i64::MAX));
            }
            _ if self.count == 0 => return FieldValue::Null,
            Statistic::Sum => self.sum,
            Statistic::Max => self.max.unwrap_or_default(),
            Statistic::Min => self.min.unwrap_or_default(),
            Statistic::Mean => self.sum / self.count as f64,
        };

        match output_type {
            FieldType::Integer => FieldValue::Integer(value.round() as i64),
            FieldType::Double | FieldType::Text => FieldValue::Double(value),
        }
    }
}

/// Resolves statistic fields to `(column index, output type)`, rejecting
/// text columns.
pub(crate) fn resolve_inputs(
    table: &dyn TableSource,
    statistics: &[StatisticField],
) -> Result<Vec<(usize, FieldType)>, SpatialError> {
    statistics
        .iter()
        .map(|stat| {
            let idx = table.field_index(&stat.field).ok_or_else(|| {
                fire_map_spatial_models::TableError::UnknownField(stat.field.clone())
            })?;
            let input_type = table.fields()[idx].field_type;
            if input_type == FieldType::Text && stat.statistic != Statistic::Count {
                return Err(SpatialError::NonNumericField {
                    field: stat.field.clone(),
                });
            }
            Ok((idx, stat.statistic.output_type(input_type)))
        })
        .collect()
}

/// Feeds one row's values into a group's accumulators.
pub(crate) fn accumulate(
    accumulators: &mut [Accumulator],
    inputs: &[(usize, FieldType)],
    statistics: &[StatisticField],
    row: &[FieldValue],
) -> Result<(), SpatialError> {
    for ((acc, (idx, _)), stat) in accumulators.iter_mut().zip(inputs).zip(statistics) {
        match &row[*idx] {
            FieldValue::Null => {}
            value => {
                // Count only needs presence, so text cells are fine there.
                let number = value
                    .as_f64()
                    .or((stat.statistic == Statistic::Count).then_some(0.0))
                    .ok_or_else(|| SpatialError::NonNumericField {
                        field: stat.field.clone(),
                    })?;
                acc.push(number);
            }
        }
    }
    Ok(())
}

/// Computes `statistics` over `table`, grouped by `case_field` when given.
///
/// Output columns: the case field (if any), [`FREQUENCY`], then one
/// `<STAT>_<field>` column per statistic. Without a case field a single
/// summary row is produced, even for an empty input.
///
/// # Errors
///
/// Returns [`SpatialError`] if a field is missing or holds text.
pub fn compute_statistics(
    table: &dyn TableSource,
    statistics: &[StatisticField],
    case_field: Option<&str>,
) -> Result<AttributeTable, SpatialError> {
    let inputs = resolve_inputs(table, statistics)?;

    let case = case_field
        .map(|name| {
            table
                .field_index(name)
                .map(|idx| (idx, table.fields()[idx].clone()))
                .ok_or_else(|| fire_map_spatial_models::TableError::UnknownField(name.to_string()))
        })
        .transpose()?;

    let mut fields = Vec::with_capacity(statistics.len() + 2);
    if let Some((_, field)) = &case {
        fields.push(Field::new(field.name.clone(), field.field_type));
    }
    fields.push(Field::new(FREQUENCY, FieldType::Integer));
    for (stat, (_, output_type)) in statistics.iter().zip(&inputs) {
        fields.push(Field::new(stat.output_name(), *output_type));
    }
    let mut output = AttributeTable::new(fields)?;

    let mut groups: BTreeMap<GroupKey, (u64, Vec<Accumulator>)> = BTreeMap::new();
    if case.is_none() {
        groups.insert(
            GroupKey(FieldValue::Null),
            (0, vec![Accumulator::default(); statistics.len()]),
        );
    }

    for row in table.rows() {
        let key = case
            .as_ref()
            .map_or(FieldValue::Null, |(idx, _)| row[*idx].clone());
        let (frequency, accumulators) = groups
            .entry(GroupKey(key))
            .or_insert_with(|| (0, vec![Accumulator::default(); statistics.len()]));
        *frequency += 1;
        accumulate(accumulators, &inputs, statistics, &row)?;
    }

    for (GroupKey(key), (frequency, accumulators)) in groups {
        let mut values = Vec::with_capacity(statistics.len() + 2);
        if case.is_some() {
            values.push(key);
        }
        values.push(FieldValue::Integer(
            i64::try_from(frequency).unwrap_or(i64::MAX),
        ));
        for ((acc, stat), (_, output_type)) in accumulators.iter().zip(statistics).zip(&inputs) {
            values.push(acc.finish(stat.statistic, *output_type));
        }
        output.push_row(values)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> AttributeTable {
        let mut table = AttributeTable::new(vec![
            Field::new("COUNTRY", FieldType::Text),
            Field::new("Point_Count", FieldType::Integer),
            Field::new("max_confidence", FieldType::Integer),
        ])
        .unwrap();
        for (country, count, max) in [
            ("Brazil", 3, FieldValue::Integer(80)),
            ("Argentina", 1, FieldValue::Integer(55)),
            ("Brazil", 2, FieldValue::Integer(97)),
            ("Chile", 0, FieldValue::Null),
        ] {
            table
                .push_row(vec![country.into(), FieldValue::Integer(count), max])
                .unwrap();
        }
        table
    }

    #[test]
    fn groups_by_case_field_in_sorted_order() {
        let stats = [
            StatisticField::new("Point_Count", Statistic::Sum),
            StatisticField::new("max_confidence", Statistic::Max),
        ];
        let output = compute_statistics(&summary(), &stats, Some("COUNTRY")).unwrap();

        assert_eq!(
            output
                .fields()
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            vec![
                "COUNTRY",
                "FREQUENCY",
                "SUM_Point_Count",
                "MAX_max_confidence"
            ]
        );
        assert_eq!(
            output.row_slice(),
            &[
                vec![
                    "Argentina".into(),
                    FieldValue::Integer(1),
                    FieldValue::Integer(1),
                    FieldValue::Integer(55)
                ],
                vec![
                    "Brazil".into(),
                    FieldValue::Integer(2),
                    FieldValue::Integer(5),
                    FieldValue::Integer(97)
                ],
                vec![
                    "Chile".into(),
                    FieldValue::Integer(1),
                    FieldValue::Integer(0),
                    FieldValue::Null
                ],
            ]
        );
    }

    #[test]
    fn mean_without_case_field_is_single_row() {
        let stats = [StatisticField::new("Point_Count", Statistic::Mean)];
        let output = compute_statistics(&summary(), &stats, None).unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output.value(0, "FREQUENCY"), Some(&FieldValue::Integer(4)));
        assert_eq!(
            output.value(0, "MEAN_Point_Count"),
            Some(&FieldValue::Double(1.5))
        );
    }

    #[test]
    fn empty_input_with_case_field_has_no_rows() {
        let empty = AttributeTable::new(vec![
            Field::new("COUNTRY", FieldType::Text),
            Field::new("Point_Count", FieldType::Integer),
        ])
        .unwrap();
        let stats = [StatisticField::new("Point_Count", Statistic::Sum)];
        let output = compute_statistics(&empty, &stats, Some("COUNTRY")).unwrap();

        assert!(output.is_empty());
        assert_eq!(output.fields().len(), 3);
    }

    #[test]
    fn rejects_text_statistics() {
        let stats = [StatisticField::new("COUNTRY", Statistic::Max)];
        let err = compute_statistics(&summary(), &stats, None).unwrap_err();
        assert!(matches!(err, SpatialError::NonNumericField { field } if field == "COUNTRY"));
    }

    #[test]
    fn rejects_unknown_case_field() {
        let err = compute_statistics(&summary(), &[], Some("NAME")).unwrap_err();
        assert!(matches!(err, SpatialError::Table(_)));
    }
}
