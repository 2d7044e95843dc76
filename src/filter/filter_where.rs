use serde_json::Value;

use super::error::FilterError;
use super::filter::is_identifier;
use super::types::FilterOp;

/// Renders a JSON WHERE object into a parameterized PostgreSQL predicate.
///
/// Sibling keys are joined with AND. Logical operators always render
/// parenthesized, so the result can be conjoined with another predicate
/// without changing its meaning.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Placeholders are numbered from `starting_param_index + 1`.
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where
            .build_clause(where_data)?
            .unwrap_or_else(|| "1=1".to_string());
        Ok((clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        Self::generate(where_data, 0).map(|_| ())
    }

    fn build_clause(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        match where_data {
            Value::Null => Ok(None),
            Value::Object(obj) => {
                let mut parts = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        if let Some(sql) = self.build_logical(key, value)? {
                            parts.push(sql);
                        }
                    } else {
                        parts.extend(self.build_field(key, value)?);
                    }
                }
                if parts.is_empty() { Ok(None) } else { Ok(Some(parts.join(" AND "))) }
            }
            Value::String(_) => Err(FilterError::InvalidWhereClause("Raw SQL predicates are not supported".to_string())),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<Option<String>, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut sql_parts = Vec::new();
                let mut has_tautology = false;
                for v in arr {
                    match self.build_clause(v)? {
                        Some(sql) => sql_parts.push(format!("({})", sql)),
                        None => has_tautology = true,
                    }
                }
                if op == "$and" {
                    if sql_parts.is_empty() { Ok(None) } else { Ok(Some(format!("({})", sql_parts.join(" AND ")))) }
                } else if has_tautology {
                    Ok(Some("1=1".to_string()))
                } else if sql_parts.is_empty() {
                    Ok(Some("1=0".to_string()))
                } else {
                    Ok(Some(format!("({})", sql_parts.join(" OR "))))
                }
            }
            "$not" => match self.build_clause(value)? {
                Some(sql) => Ok(Some(format!("NOT ({})", sql))),
                None => Ok(Some("1=0".to_string())),
            },
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn build_field(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        if !is_identifier(field) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", field)));
        }
        let quoted_column = format!("\"{}\"", field);

        match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => {
                let mut out = Vec::new();
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    out.push(self.build_condition(&quoted_column, operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit membership: { field: [a, b] }
            Value::Array(_) => Ok(vec![self.build_condition(&quoted_column, FilterOp::In, value)?]),
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_condition(&quoted_column, FilterOp::Eq, value)?]),
        }
    }

    fn build_condition(&mut self, column: &str, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        match operator {
            FilterOp::Eq => {
                if data.is_null() { Ok(format!("{} IS NULL", column)) }
                else { Ok(format!("{} = {}", column, self.param(data.clone()))) }
            }
            FilterOp::Ne => {
                if data.is_null() { Ok(format!("{} IS NOT NULL", column)) }
                else { Ok(format!("{} <> {}", column, self.param(data.clone()))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", column, self.scalar_param(operator, data)?)),
            FilterOp::Gte => Ok(format!("{} >= {}", column, self.scalar_param(operator, data)?)),
            FilterOp::Lt => Ok(format!("{} < {}", column, self.scalar_param(operator, data)?)),
            FilterOp::Lte => Ok(format!("{} <= {}", column, self.scalar_param(operator, data)?)),
            FilterOp::Like => Ok(format!("{} LIKE {}", column, self.pattern_param(operator, data)?)),
            FilterOp::NLike => Ok(format!("{} NOT LIKE {}", column, self.pattern_param(operator, data)?)),
            FilterOp::ILike => Ok(format!("{} ILIKE {}", column, self.pattern_param(operator, data)?)),
            FilterOp::NILike => Ok(format!("{} NOT ILIKE {}", column, self.pattern_param(operator, data)?)),
            FilterOp::In | FilterOp::NIn => {
                let negated = operator == FilterOp::NIn;
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if negated { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negated { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", column, keyword, params.join(", ")))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                )),
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            FilterOp::Exists | FilterOp::Null => {
                let flag = data.as_bool().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{:?} requires a boolean", operator))
                })?;
                let is_null = (operator == FilterOp::Null) == flag;
                Ok(format!("{} {}", column, if is_null { "IS NULL" } else { "IS NOT NULL" }))
            }
        }
    }

    fn scalar_param(&mut self, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        match data {
            Value::Number(_) | Value::String(_) | Value::Bool(_) => Ok(self.param(data.clone())),
            _ => Err(FilterError::InvalidOperatorData(format!("{:?} requires a scalar value", operator))),
        }
    }

    fn pattern_param(&mut self, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        match data {
            Value::String(_) => Ok(self.param(data.clone())),
            _ => Err(FilterError::InvalidOperatorData(format!("{:?} requires a string pattern", operator))),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_implicit_equality_and_null() {
        let (sql, params) = FilterWhere::generate(&json!({"name": "Alpha", "region": null}), 0).unwrap();
        assert_eq!(sql, "\"name\" = $1 AND \"region\" IS NULL");
        assert_eq!(params, vec![json!("Alpha")]);
    }

    #[test]
    fn test_param_numbering_continues_from_offset() {
        let (sql, params) = FilterWhere::generate(&json!({"score": {"$gte": 3, "$lt": 9}}), 2).unwrap();
        assert_eq!(sql, "\"score\" >= $3 AND \"score\" < $4");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_nested_logical_operators_are_parenthesized() {
        let where_data = json!({
            "$or": [
                {"status": "open"},
                {"$and": [{"severity": {"$gt": 2}}, {"region": {"$in": ["north", "east"]}}]}
            ]
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        assert_eq!(
            sql,
            "((\"status\" = $1) OR (((\"severity\" > $2) AND (\"region\" IN ($3, $4)))))"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let (sql, _) = FilterWhere::generate(&json!({"id": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "1=0");
    }

    #[test]
    fn test_rejects_raw_sql_and_bad_columns() {
        assert!(FilterWhere::validate(&json!("1=1) OR (1=1")).is_err());
        assert!(FilterWhere::validate(&json!({"name\" OR 1=1 --": "x"})).is_err());
        assert!(FilterWhere::validate(&json!({"name": {"$regex": "x"}})).is_err());
    }

    #[test]
    fn test_empty_where_is_tautology() {
        let (sql, params) = FilterWhere::generate(&Value::Null, 0).unwrap();
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }
}
