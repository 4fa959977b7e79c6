// Hive DDL helpers
//
// Reads and rewrites table definitions held as ordered `SHOW CREATE TABLE`
// lines. Every strategy derives its target definitions through here.

use crate::models::{CopySpec, TableType};

pub const PURGE: &str = "external.table.purge";
pub const TRANSACTIONAL: &str = "transactional";
pub const TRANSACTIONAL_PROPERTIES: &str = "transactional_properties";
pub const LEGACY_MANAGED: &str = "hms-mirror.legacy.managed";
pub const DOWNGRADED_IN_PLACE: &str = "hms-mirror.downgraded.inplace";

fn upper(line: &str) -> String {
    line.trim().to_uppercase()
}

fn first_line(definition: &[String]) -> Option<&String> {
    definition.iter().find(|l| !l.trim().is_empty())
}

pub fn is_view(definition: &[String]) -> bool {
    first_line(definition)
        .map(|l| {
            let u = upper(l);
            u.starts_with("CREATE VIEW") || u.starts_with("CREATE MATERIALIZED VIEW")
        })
        .unwrap_or(false)
}

pub fn is_external(definition: &[String]) -> bool {
    first_line(definition)
        .map(|l| upper(l).starts_with("CREATE EXTERNAL TABLE"))
        .unwrap_or(false)
}

pub fn is_managed(definition: &[String]) -> bool {
    !definition.is_empty() && !is_view(definition) && !is_external(definition)
}

pub fn is_acid(definition: &[String]) -> bool {
    tbl_property(definition, TRANSACTIONAL)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Tables backed by a storage handler (HBase, Kafka, JDBC...) are not native
pub fn is_hive_native(definition: &[String]) -> bool {
    !definition.iter().any(|l| upper(l).starts_with("STORED BY"))
}

pub fn is_partitioned(definition: &[String]) -> bool {
    definition.iter().any(|l| upper(l).starts_with("PARTITIONED BY"))
}

/// External table that owns its data
pub fn is_purge(definition: &[String]) -> bool {
    tbl_property(definition, PURGE)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn table_type(definition: &[String]) -> TableType {
    if is_external(definition) {
        TableType::ExternalTable
    } else {
        TableType::ManagedTable
    }
}

fn unquote(value: &str) -> String {
    value
        .trim()
        .trim_end_matches(',')
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

fn location_index(definition: &[String]) -> Option<usize> {
    definition.iter().position(|l| {
        let u = upper(l);
        u == "LOCATION" || u.starts_with("LOCATION '") || u.starts_with("LOCATION \"")
    })
}

pub fn table_location(definition: &[String]) -> Option<String> {
    let idx = location_index(definition)?;
    let line = definition[idx].trim();
    let value = if line.len() > "LOCATION".len() {
        unquote(&line["LOCATION".len()..])
    } else {
        unquote(definition.get(idx + 1)?)
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn remove_location(definition: &mut Vec<String>) {
    if let Some(idx) = location_index(definition) {
        let single_line = definition[idx].trim().len() > "LOCATION".len();
        definition.remove(idx);
        if !single_line && idx < definition.len() {
            definition.remove(idx);
        }
    }
}

pub fn update_location(definition: &mut Vec<String>, location: &str) {
    let quoted = format!("  '{}'", location);
    if let Some(idx) = location_index(definition) {
        let single_line = definition[idx].trim().len() > "LOCATION".len();
        if single_line {
            definition[idx] = "LOCATION".to_string();
            definition.insert(idx + 1, quoted);
        } else if idx + 1 < definition.len() {
            definition[idx + 1] = quoted;
        } else {
            definition.push(quoted);
        }
        return;
    }
    let at = properties_block(definition)
        .map(|(start, _)| start)
        .unwrap_or(definition.len());
    definition.insert(at, quoted);
    definition.insert(at, "LOCATION".to_string());
}

/// Replace the table identifier on the CREATE line
pub fn set_table_name(definition: &mut [String], name: &str) {
    let Some(line) = definition.iter_mut().find(|l| !l.trim().is_empty()) else {
        return;
    };
    let u = line.to_uppercase();
    let Some(pos) = u.find(" TABLE ").or_else(|| u.find(" VIEW ")) else {
        return;
    };
    let keyword_len = if u[pos..].starts_with(" TABLE ") { 7 } else { 6 };
    let start = pos + keyword_len;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| c == '(' || c.is_whitespace())
        .map(|i| start + i)
        .unwrap_or(line.len());
    line.replace_range(start..end, &format!("`{}`", name));
}

pub fn make_external(definition: &mut [String]) {
    if is_external(definition) || is_view(definition) {
        return;
    }
    if let Some(line) = definition.iter_mut().find(|l| !l.trim().is_empty()) {
        if let Some(pos) = line.to_uppercase().find("CREATE TABLE") {
            line.replace_range(pos..pos + "CREATE TABLE".len(), "CREATE EXTERNAL TABLE");
        }
    }
}

fn properties_block(definition: &[String]) -> Option<(usize, usize)> {
    let start = definition
        .iter()
        .position(|l| upper(l).starts_with("TBLPROPERTIES"))?;
    let end = (start..definition.len())
        .find(|&i| definition[i].trim_end().ends_with(')'))
        .unwrap_or(definition.len() - 1);
    Some((start, end))
}

/// Single-quoted tokens in order, honouring backslash escapes
fn quoted_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut token = String::new();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(next) = chars.next() {
                        token.push(next);
                    }
                }
                '\'' => break,
                other => token.push(other),
            }
        }
        tokens.push(token);
    }
    tokens
}

pub fn tbl_properties(definition: &[String]) -> Vec<(String, String)> {
    let Some((start, end)) = properties_block(definition) else {
        return Vec::new();
    };
    let text = definition[start..=end].join(" ");
    let body = text.find('(').map(|i| &text[i + 1..]).unwrap_or("");
    quoted_tokens(body)
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect()
}

pub fn tbl_property(definition: &[String], key: &str) -> Option<String> {
    tbl_properties(definition)
        .into_iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn write_properties(definition: &mut Vec<String>, properties: &[(String, String)]) {
    let block = properties_block(definition);
    let at = match block {
        Some((start, end)) => {
            definition.drain(start..=end);
            start
        }
        None => definition.len(),
    };
    if properties.is_empty() {
        return;
    }
    let mut lines = vec!["TBLPROPERTIES (".to_string()];
    for (idx, (k, v)) in properties.iter().enumerate() {
        let tail = if idx + 1 == properties.len() { ")" } else { "," };
        lines.push(format!("  '{}'='{}'{}", k, v.replace('\'', "\\'"), tail));
    }
    definition.splice(at..at, lines);
}

pub fn upsert_tbl_property(definition: &mut Vec<String>, key: &str, value: &str) {
    let mut properties = tbl_properties(definition);
    match properties.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        Some(entry) => entry.1 = value.to_string(),
        None => properties.push((key.to_string(), value.to_string())),
    }
    write_properties(definition, &properties);
}

pub fn remove_tbl_property(definition: &mut Vec<String>, key: &str) -> bool {
    let mut properties = tbl_properties(definition);
    let before = properties.len();
    properties.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    if properties.len() == before {
        return false;
    }
    write_properties(definition, &properties);
    true
}

pub fn bucket_count(definition: &[String]) -> Option<u32> {
    definition.iter().find_map(|l| {
        let u = upper(l);
        if u.starts_with("INTO ") && u.ends_with("BUCKETS") {
            u.split_whitespace().nth(1).and_then(|n| n.parse().ok())
        } else {
            None
        }
    })
}

/// Remove CLUSTERED BY ... INTO n BUCKETS
pub fn remove_buckets(definition: &mut Vec<String>) -> bool {
    let Some(start) = definition
        .iter()
        .position(|l| upper(l).starts_with("CLUSTERED BY"))
    else {
        return false;
    };
    let Some(end) = (start..definition.len()).find(|&i| {
        let u = upper(&definition[i]);
        u.contains("INTO ") && u.ends_with("BUCKETS")
    }) else {
        return false;
    };
    definition.drain(start..=end);
    true
}

fn column_name(line: &str) -> Option<String> {
    let token = line
        .trim()
        .trim_start_matches("PARTITIONED BY (")
        .split_whitespace()
        .next()?;
    let name = token.trim_matches(|c| c == '`' || c == '(' || c == ',');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Partition column names in declaration order
pub fn partition_columns(definition: &[String]) -> Vec<String> {
    let Some(start) = definition
        .iter()
        .position(|l| upper(l).starts_with("PARTITIONED BY"))
    else {
        return Vec::new();
    };
    let mut columns = Vec::new();
    let header = definition[start].trim();
    let inline = header.trim_start_matches(|c| c != '(').trim_start_matches('(');
    if !inline.trim().is_empty() {
        if let Some(name) = column_name(inline) {
            columns.push(name);
        }
        if header.ends_with(')') {
            return columns;
        }
    }
    for line in &definition[start + 1..] {
        if let Some(name) = column_name(line) {
            columns.push(name);
        }
        if line.trim_end().ends_with(')') {
            break;
        }
    }
    columns
}

fn column_block(definition: &[String]) -> Vec<String> {
    let mut block = Vec::new();
    let mut iter = definition.iter().skip_while(|l| l.trim().is_empty());
    if iter.next().is_none() {
        return block;
    }
    for line in iter {
        block.push(line.trim().to_lowercase());
        if line.trim_end().ends_with(')') {
            break;
        }
    }
    block
}

fn partition_block(definition: &[String]) -> Vec<String> {
    let Some(start) = definition
        .iter()
        .position(|l| upper(l).starts_with("PARTITIONED BY"))
    else {
        return Vec::new();
    };
    let mut block = Vec::new();
    for line in &definition[start..] {
        block.push(line.trim().to_lowercase());
        if line.trim_end().ends_with(')') {
            break;
        }
    }
    block
}

/// Column and partition layouts match; names, locations and properties ignored
pub fn schemas_equal(a: &[String], b: &[String]) -> bool {
    column_block(a) == column_block(b) && partition_block(a) == partition_block(b)
}

pub fn create_statement(definition: &[String]) -> String {
    definition.join("\n")
}

/// Derive a target definition from `source` as described by `spec`
pub fn apply_copy_spec(source: &[String], source_name: &str, spec: &CopySpec) -> Vec<String> {
    let mut definition = source.to_vec();
    set_table_name(&mut definition, &spec.target_name(source_name));

    if spec.make_non_transactional {
        remove_tbl_property(&mut definition, TRANSACTIONAL);
        remove_tbl_property(&mut definition, TRANSACTIONAL_PROPERTIES);
    }
    if spec.make_external {
        make_external(&mut definition);
    }
    if spec.upgrade {
        upsert_tbl_property(&mut definition, LEGACY_MANAGED, "true");
    }
    if spec.take_ownership {
        upsert_tbl_property(&mut definition, PURGE, "true");
    } else if is_external(&definition) {
        remove_tbl_property(&mut definition, PURGE);
    }
    if let Some(threshold) = spec.strip_buckets_at_or_below {
        if bucket_count(&definition).map(|n| n <= threshold).unwrap_or(false) {
            remove_buckets(&mut definition);
        }
    }
    if spec.strip_location {
        remove_location(&mut definition);
    } else if spec.replace_location {
        if let Some(location) = &spec.location {
            update_location(&mut definition, location);
        }
    }
    definition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;

    fn acid_partitioned() -> Vec<String> {
        [
            "CREATE TABLE `sales`(",
            "  `id` bigint,",
            "  `amount` decimal(10,2))",
            "PARTITIONED BY (",
            "  `region` string,",
            "  `day` string)",
            "CLUSTERED BY (",
            "  id)",
            "INTO 2 BUCKETS",
            "ROW FORMAT SERDE",
            "  'org.apache.hadoop.hive.ql.io.orc.OrcSerde'",
            "LOCATION",
            "  'hdfs://left/warehouse/tablespace/managed/hive/db1.db/sales'",
            "TBLPROPERTIES (",
            "  'bucketing_version'='2',",
            "  'transactional'='true',",
            "  'transactional_properties'='default')",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_detection() {
        let def = acid_partitioned();
        assert!(is_acid(&def));
        assert!(is_managed(&def));
        assert!(!is_external(&def));
        assert!(is_partitioned(&def));
        assert!(is_hive_native(&def));
        assert_eq!(bucket_count(&def), Some(2));
        assert_eq!(partition_columns(&def), vec!["region", "day"]);
        assert_eq!(
            table_location(&def).as_deref(),
            Some("hdfs://left/warehouse/tablespace/managed/hive/db1.db/sales")
        );
    }

    #[test]
    fn test_property_rewrite_keeps_block_well_formed() {
        let mut def = acid_partitioned();
        remove_tbl_property(&mut def, TRANSACTIONAL_PROPERTIES);
        remove_tbl_property(&mut def, TRANSACTIONAL);
        assert!(!is_acid(&def));
        assert_eq!(def.last().unwrap(), "  'bucketing_version'='2')");
        upsert_tbl_property(&mut def, PURGE, "true");
        assert!(is_purge(&def));
        assert_eq!(tbl_properties(&def).len(), 2);
        remove_tbl_property(&mut def, "bucketing_version");
        remove_tbl_property(&mut def, PURGE);
        assert!(!def.iter().any(|l| l.contains("TBLPROPERTIES")));
    }

    #[test]
    fn test_single_line_properties() {
        let def = vec![
            "CREATE EXTERNAL TABLE `t`(".to_string(),
            "  `a` int)".to_string(),
            "TBLPROPERTIES ('external.table.purge'='TRUE', 'x'='it\\'s')".to_string(),
        ];
        assert!(is_purge(&def));
        assert_eq!(tbl_property(&def, "x").as_deref(), Some("it's"));
    }

    #[test]
    fn test_location_rewrite() {
        let mut def = acid_partitioned();
        update_location(&mut def, "hdfs://right/ext/sales");
        assert_eq!(table_location(&def).as_deref(), Some("hdfs://right/ext/sales"));
        remove_location(&mut def);
        assert!(table_location(&def).is_none());
        update_location(&mut def, "hdfs://right/again");
        let loc_idx = def.iter().position(|l| l == "LOCATION").unwrap();
        let props_idx = def.iter().position(|l| l.starts_with("TBLPROPERTIES")).unwrap();
        assert!(loc_idx < props_idx);
    }

    #[test]
    fn test_table_name_and_external() {
        let mut def = vec!["CREATE TABLE `db1`.`sales`(".to_string(), "  `id` int)".to_string()];
        set_table_name(&mut def, "hms_mirror_shadow_sales");
        make_external(&mut def);
        assert_eq!(def[0], "CREATE EXTERNAL TABLE `hms_mirror_shadow_sales`(");
    }

    #[test]
    fn test_schema_compare_ignores_location_and_name() {
        let a = acid_partitioned();
        let mut b = acid_partitioned();
        set_table_name(&mut b, "other");
        update_location(&mut b, "hdfs://elsewhere");
        assert!(schemas_equal(&a, &b));
        b[2] = "  `amount` double)".to_string();
        assert!(!schemas_equal(&a, &b));
    }

    #[test]
    fn test_apply_copy_spec_downgrade() {
        let spec = CopySpec::new(Environment::Left, Environment::Right)
            .make_external()
            .make_non_transactional()
            .take_ownership(true)
            .strip_buckets_at_or_below(2)
            .with_location("hdfs://right/ext/db1.db/sales");
        let def = apply_copy_spec(&acid_partitioned(), "sales", &spec);
        assert!(is_external(&def));
        assert!(!is_acid(&def));
        assert!(is_purge(&def));
        assert_eq!(bucket_count(&def), None);
        assert_eq!(table_location(&def).as_deref(), Some("hdfs://right/ext/db1.db/sales"));
    }

    #[test]
    fn test_bucket_strip_respects_threshold() {
        let spec = CopySpec::new(Environment::Left, Environment::Right).strip_buckets_at_or_below(1);
        let def = apply_copy_spec(&acid_partitioned(), "sales", &spec);
        assert_eq!(bucket_count(&def), Some(2));
    }
}
