//! Post-aggregation steps
//!
//! These run over the per-group rows produced by the grouping step. They
//! correspond to the SQL window functions `SUM(..) OVER ()`,
//! `SUM(..) OVER (ORDER BY ..)` and `DENSE_RANK() OVER (PARTITION BY ..)`.

use crate::query::definition::{Direction, OrderKey};
use crate::query::planner::PostAggregation;
use crate::store::memory::MemoryStoreError;
use crate::types::{QueryResult, Row, Value};
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// Apply one post-aggregation step
pub fn apply(result: QueryResult, step: &PostAggregation) -> Result<QueryResult, MemoryStoreError> {
    match step {
        PostAggregation::AverageOfGroups { measure, alias } => {
            average_of_groups(&result, measure, alias)
        }
        PostAggregation::ShareOfTotal { measure, alias } => share_of_total(result, measure, alias),
        PostAggregation::RunningTotal {
            order_column,
            measure,
            alias,
        } => running_total(result, order_column, measure, alias),
        PostAggregation::RankWithin {
            partition,
            item,
            measure,
            alias,
            keep_top,
        } => rank_within(result, partition, item, measure, alias, *keep_top),
    }
}

/// Collapse to a single row holding the mean of `measure` across groups
///
/// NULL when there are no groups.
pub fn average_of_groups(
    result: &QueryResult,
    measure: &str,
    alias: &str,
) -> Result<QueryResult, MemoryStoreError> {
    let idx = column(result, measure)?;
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in &result.rows {
        let value = value_at(row, idx);
        if value.is_null() {
            continue;
        }
        sum += value.as_f64().ok_or_else(|| not_numeric(measure, value))?;
        count += 1;
    }

    let average = if count == 0 {
        Value::Null
    } else {
        Value::Float(sum / count as f64)
    };
    let mut out = QueryResult::new(vec![alias.to_string()]);
    out.add_row(Row::new(vec![average]));
    Ok(out)
}

/// Append `alias` = `measure` as a percentage of its sum over all rows
///
/// The total is summed exactly before dividing. A zero total yields NULL
/// shares.
pub fn share_of_total(
    mut result: QueryResult,
    measure: &str,
    alias: &str,
) -> Result<QueryResult, MemoryStoreError> {
    let idx = column(&result, measure)?;
    let mut total = Value::Null;
    for row in &result.rows {
        total = add(&total, value_at(row, idx), measure)?;
    }

    let total = total.as_f64().filter(|t| *t != 0.0);
    for row in &mut result.rows {
        let share = match (value_at(row, idx).as_f64(), total) {
            (Some(part), Some(total)) => Value::Float(part * 100.0 / total),
            _ => Value::Null,
        };
        row.values.push(share);
    }
    result.columns.push(alias.to_string());
    Ok(result)
}

/// Append `alias` = running sum of `measure` in ascending `order_column` order
///
/// Rows with equal keys all carry the total through the last of them.
pub fn running_total(
    mut result: QueryResult,
    order_column: &str,
    measure: &str,
    alias: &str,
) -> Result<QueryResult, MemoryStoreError> {
    let key = column(&result, order_column)?;
    let idx = column(&result, measure)?;
    result
        .rows
        .sort_by(|a, b| value_at(a, key).total_cmp(value_at(b, key)));

    let rows = &mut result.rows;
    let mut running = Value::Null;
    let mut start = 0;
    while start < rows.len() {
        let mut end = start;
        while end < rows.len()
            && value_at(&rows[end], key)
                .total_cmp(value_at(&rows[start], key))
                .is_eq()
        {
            running = add(&running, value_at(&rows[end], idx), measure)?;
            end += 1;
        }
        for row in &mut rows[start..end] {
            row.values.push(running.clone());
        }
        start = end;
    }

    result.columns.push(alias.to_string());
    Ok(result)
}

/// Append `alias` = dense rank within `partition` by `measure` descending,
/// then `item` ascending; keep rows ranked `keep_top` or better
pub fn rank_within(
    mut result: QueryResult,
    partition: &str,
    item: &str,
    measure: &str,
    alias: &str,
    keep_top: usize,
) -> Result<QueryResult, MemoryStoreError> {
    let part = column(&result, partition)?;
    let name = column(&result, item)?;
    let idx = column(&result, measure)?;

    result.rows.sort_by(|a, b| {
        value_at(a, part)
            .total_cmp(value_at(b, part))
            .then_with(|| value_at(b, idx).total_cmp(value_at(a, idx)))
            .then_with(|| value_at(a, name).total_cmp(value_at(b, name)))
    });

    let mut kept = Vec::with_capacity(result.rows.len());
    let mut rank = 0usize;
    let mut previous: Option<Row> = None;
    for mut row in result.rows.drain(..) {
        let same_partition = previous
            .as_ref()
            .map_or(false, |p| value_at(p, part).total_cmp(value_at(&row, part)).is_eq());
        let tied = same_partition
            && previous.as_ref().map_or(false, |p| {
                value_at(p, idx).total_cmp(value_at(&row, idx)).is_eq()
                    && value_at(p, name).total_cmp(value_at(&row, name)).is_eq()
            });
        rank = match (same_partition, tied) {
            (false, _) => 1,
            (true, true) => rank,
            (true, false) => rank + 1,
        };
        previous = Some(row.clone());
        if rank <= keep_top {
            row.values.push(Value::Integer(rank as i64));
            kept.push(row);
        }
    }

    result.rows = kept;
    result.columns.push(alias.to_string());
    Ok(result)
}

/// Stable sort by the given keys
pub fn sort_rows(result: &mut QueryResult, keys: &[OrderKey]) -> Result<(), MemoryStoreError> {
    if keys.is_empty() {
        return Ok(());
    }
    let resolved = keys
        .iter()
        .map(|key| column(result, &key.column).map(|idx| (idx, key.direction)))
        .collect::<Result<Vec<_>, _>>()?;

    result.rows.sort_by(|a, b| {
        resolved
            .iter()
            .map(|(idx, direction)| {
                let ordering = value_at(a, *idx).total_cmp(value_at(b, *idx));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(())
}

fn column(result: &QueryResult, name: &str) -> Result<usize, MemoryStoreError> {
    result
        .column_index(name)
        .ok_or_else(|| MemoryStoreError::UnknownColumn(name.to_string()))
}

fn value_at(row: &Row, idx: usize) -> &Value {
    row.values.get(idx).unwrap_or(&NULL)
}

fn add(total: &Value, value: &Value, column: &str) -> Result<Value, MemoryStoreError> {
    if !value.is_null() && !value.data_type().map_or(false, |t| t.is_numeric()) {
        return Err(not_numeric(column, value));
    }
    total
        .checked_add(value)
        .ok_or_else(|| MemoryStoreError::Overflow(column.to_string()))
}

fn not_numeric(column: &str, value: &Value) -> MemoryStoreError {
    MemoryStoreError::NotNumeric {
        column: column.to_string(),
        found: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(Row::new).collect(),
        }
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_average_of_groups() {
        let input = result(
            &["day", "qty"],
            vec![vec![text("a"), 3.into()], vec![text("b"), 4.into()]],
        );
        let out = average_of_groups(&input, "qty", "avg_qty").unwrap();
        assert_eq!(out.columns, vec!["avg_qty"]);
        assert_eq!(out.rows[0].values, vec![Value::Float(3.5)]);

        let empty = result(&["day", "qty"], vec![]);
        let out = average_of_groups(&empty, "qty", "avg_qty").unwrap();
        assert_eq!(out.rows[0].values, vec![Value::Null]);
    }

    #[test]
    fn test_share_of_total() {
        let input = result(
            &["name", "revenue"],
            vec![
                vec![text("a"), Value::Decimal(3000)],
                vec![text("b"), Value::Decimal(2000)],
            ],
        );
        let out = share_of_total(input, "revenue", "share").unwrap();
        assert_eq!(out.rows[0].values[2], Value::Float(60.0));
        assert_eq!(out.rows[1].values[2], Value::Float(40.0));
    }

    #[test]
    fn test_share_of_zero_total_is_null() {
        let input = result(
            &["name", "revenue"],
            vec![vec![text("a"), Value::Decimal(0)]],
        );
        let out = share_of_total(input, "revenue", "share").unwrap();
        assert_eq!(out.rows[0].values[2], Value::Null);
    }

    #[test]
    fn test_running_total_orders_and_shares_ties() {
        let day = |d| Value::Date(NaiveDate::from_ymd_opt(2015, 1, d).unwrap());
        let input = result(
            &["day", "revenue"],
            vec![
                vec![day(3), Value::Decimal(100)],
                vec![day(1), Value::Decimal(200)],
                vec![day(3), Value::Decimal(50)],
            ],
        );
        let out = running_total(input, "day", "revenue", "cum").unwrap();
        let cumulative: Vec<&Value> = out.rows.iter().map(|r| &r.values[2]).collect();
        assert_eq!(
            cumulative,
            vec![&Value::Decimal(200), &Value::Decimal(350), &Value::Decimal(350)]
        );
    }

    #[test]
    fn test_rank_within_keeps_top() {
        let input = result(
            &["category", "pizza", "revenue"],
            vec![
                vec![text("veggie"), text("x"), Value::Decimal(500)],
                vec![text("classic"), text("b"), Value::Decimal(900)],
                vec![text("classic"), text("a"), Value::Decimal(900)],
                vec![text("classic"), text("c"), Value::Decimal(100)],
            ],
        );
        let out = rank_within(input, "category", "pizza", "revenue", "rank", 2).unwrap();
        let rows: Vec<(String, String, i64)> = out
            .rows
            .iter()
            .map(|r| {
                (
                    r.values[0].to_string(),
                    r.values[1].to_string(),
                    r.values[3].as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("classic".to_string(), "a".to_string(), 1),
                ("classic".to_string(), "b".to_string(), 2),
                ("veggie".to_string(), "x".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_sort_rows_multiple_keys() {
        let mut input = result(
            &["name", "qty"],
            vec![
                vec![text("b"), 2.into()],
                vec![text("a"), 2.into()],
                vec![text("c"), 5.into()],
            ],
        );
        sort_rows(&mut input, &[OrderKey::desc("qty"), OrderKey::asc("name")]).unwrap();
        let names: Vec<String> = input.rows.iter().map(|r| r.values[0].to_string()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        assert!(matches!(
            sort_rows(&mut input, &[OrderKey::asc("price")]),
            Err(MemoryStoreError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_non_numeric_measure() {
        let input = result(&["name", "qty"], vec![vec![text("a"), text("many")]]);
        assert!(matches!(
            share_of_total(input, "qty", "share"),
            Err(MemoryStoreError::NotNumeric { .. })
        ));
    }
}
