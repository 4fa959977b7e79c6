use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::models::{
    DataStrategy, DbMirror, DistCpJobDefinition, DistCpPlan, DistCpRecommendations, DistCpRequest,
    Environment, MigrationError, PathAlignment, TableMirror, TableStatistics, DEFAULT_DISTCP_OPTIONS,
};
use crate::services::location::LocationTranslator;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;
const BYTES_PER_MAPPER: u64 = 256 * MIB;
const FILES_PER_MAPPER: u64 = 1000;
const MAX_MAPPERS: u64 = 100;

/// Turns database and table locations into `hadoop distcp` job plans
pub struct DistCpPlanner {
    translator: LocationTranslator,
}

impl DistCpPlanner {
    pub fn new(translator: LocationTranslator) -> Self {
        Self { translator }
    }

    fn validate_request(request: &DistCpRequest, db: &DbMirror) -> Result<(), MigrationError> {
        let mut errors = Vec::new();
        if request.database.trim().is_empty() {
            errors.push("Database name must be provided".to_string());
        } else if request.database != db.name {
            errors.push(format!(
                "Database '{}' does not match the supplied mirror '{}'",
                request.database, db.name
            ));
        }
        if request.source_environment.is_none() {
            errors.push("Source environment must be provided".to_string());
        }
        if request.target_environment.is_none() {
            errors.push("Target environment must be provided".to_string());
        }
        if request.consolidation_level < 0 {
            errors.push("Consolidation level must be zero or greater".to_string());
        }
        if request.strategy == DataStrategy::SchemaOnly {
            errors.push("SCHEMA_ONLY does not move data; no DistCp plan can be built".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Validation(errors))
        }
    }

    pub fn generate_distcp_plan(&self, request: &DistCpRequest, db: &DbMirror) -> Result<DistCpPlan, MigrationError> {
        Self::validate_request(request, db)?;
        let source_env = request.source_environment.unwrap_or(Environment::Left);
        let level = request.consolidation_level as usize;

        let mut plan = DistCpPlan {
            database: db.name.clone(),
            ..Default::default()
        };

        let selected: Vec<&TableMirror> = match &request.tables {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let table = db.tables.get(name);
                    if table.is_none() {
                        plan.issues.push(format!("Table '{}' not found in {}", name, db.name));
                    }
                    table
                })
                .collect(),
            None => db.tables.values().collect(),
        };

        // (list name, source -> target pairs, bytes)
        let mut lists: Vec<(String, Vec<(String, String)>, u64)> = Vec::new();
        for table in selected {
            let pairs = match self.table_paths(db, table, source_env) {
                Ok(pairs) => pairs,
                Err(err) if err.is_fatal() => {
                    tracing::warn!("Skipping {}.{} in DistCp plan: {}", db.name, table.name, err);
                    plan.issues.push(format!("{}: {}", table.name, err));
                    continue;
                }
                Err(err) => {
                    plan.issues.push(format!("{}: {}", table.name, err));
                    continue;
                }
            };
            if pairs.is_empty() {
                plan.issues.push(format!("{}: no source location", table.name));
                continue;
            }
            let pairs = consolidate(pairs, level);
            let bytes = TableStatistics::from_environment(table.env(source_env)).data_size;
            if request.tables.is_some() {
                for (source, target) in &pairs {
                    plan.target_mappings.insert(source.clone(), target.clone());
                }
            }
            if request.consolidate_tables && !lists.is_empty() {
                let (_, existing, total) = &mut lists[0];
                existing.extend(pairs);
                *total += bytes;
            } else {
                let name = if request.consolidate_tables {
                    db.name.clone()
                } else {
                    format!("{}.{}", db.name, table.name)
                };
                lists.push((name, pairs, bytes));
            }
        }

        if request.tables.is_none() {
            let sources: Vec<String> = lists.iter().flat_map(|(_, p, _)| p.iter().map(|(s, _)| s.clone())).collect();
            let targets: Vec<String> = lists.iter().flat_map(|(_, p, _)| p.iter().map(|(_, t)| t.clone())).collect();
            if !sources.is_empty() {
                let source_base = Self::analyze_path_alignment(&sources, None).common_base;
                let target_base = Self::analyze_path_alignment(&targets, None).common_base;
                plan.target_mappings.insert(source_base, target_base);
            }
        }

        let mut priority = 0;
        for (name, pairs, bytes) in lists {
            // `distcp -f` lands every listed path under one directory, so a
            // list whose targets have different parents becomes several jobs
            let mut by_parent: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (source, target) in &pairs {
                let sources = by_parent.entry(parent(target)).or_default();
                if !sources.contains(source) {
                    sources.push(source.clone());
                }
            }
            let path_total: usize = by_parent.values().map(Vec::len).sum();
            let split = by_parent.len() > 1;

            plan.estimated_bytes += bytes;
            plan.path_count += path_total;
            for (idx, (target_directory, sources)) in by_parent.into_iter().enumerate() {
                let job_name = if split { format!("{}_{}", name, idx + 1) } else { name.clone() };
                let job_bytes = bytes * sources.len() as u64 / path_total.max(1) as u64;
                let recommendations = Self::calculate_execution_recommendations(job_bytes, 0);
                let source_list_file = format!("{}_distcp_source.txt", job_name);
                priority += 1;
                plan.jobs.push(DistCpJobDefinition {
                    name: format!("distcp-{}", job_name),
                    source_list_file: source_list_file.clone(),
                    target_directory,
                    options: DEFAULT_DISTCP_OPTIONS.iter().map(|o| o.to_string()).collect(),
                    priority,
                    estimated_minutes: estimate_minutes(job_bytes, &recommendations),
                });
                plan.source_lists.insert(source_list_file, sources);
            }
        }

        tracing::info!(
            "DistCp plan for {}: {} jobs, {} paths, {} bytes",
            plan.database,
            plan.jobs.len(),
            plan.path_count,
            plan.estimated_bytes
        );
        Ok(plan)
    }

    /// Source/target pairs for a table: its location plus partitions outside it
    fn table_paths(
        &self,
        db: &DbMirror,
        table: &TableMirror,
        source_env: Environment,
    ) -> Result<Vec<(String, String)>, MigrationError> {
        let env = table.env(source_env);
        let mut pairs = Vec::new();
        let base = env.location();
        if let Some(location) = &base {
            let translated = self.translator.translate(db, table, Some(location), None)?;
            pairs.push((location.clone(), translated.location));
        }
        for (spec, location) in &env.partitions {
            let inside = base
                .as_deref()
                .map(|b| location.starts_with(&format!("{}/", b.trim_end_matches('/'))))
                .unwrap_or(false);
            if inside {
                continue;
            }
            let translated = self.translator.translate(db, table, Some(location), Some(spec))?;
            pairs.push((location.clone(), translated.location));
        }
        Ok(pairs)
    }

    pub fn calculate_execution_recommendations(data_size_bytes: u64, file_count: u64) -> DistCpRecommendations {
        let by_size = data_size_bytes.div_ceil(BYTES_PER_MAPPER);
        let by_files = file_count / FILES_PER_MAPPER;
        let mappers = by_size.max(by_files).clamp(1, MAX_MAPPERS);
        let memory_mb = if data_size_bytes > 10 * GIB { 4096 } else { 2048 };
        let bandwidth_mb = if data_size_bytes > GIB { 100 } else { 50 };

        let mut options: Vec<String> = DEFAULT_DISTCP_OPTIONS.iter().map(|o| o.to_string()).collect();
        options.push(format!("-m {}", mappers));
        options.push(format!("-bandwidth {}", bandwidth_mb));
        options.push(format!("-Dmapreduce.map.memory.mb={}", memory_mb));

        DistCpRecommendations {
            mappers,
            memory_mb,
            bandwidth_mb,
            options,
        }
    }

    /// Longest common directory of `paths`, and which paths sit under it
    ///
    /// With `expected_base`, paths are classified against that directory
    /// instead of the computed one.
    pub fn analyze_path_alignment(paths: &[String], expected_base: Option<&str>) -> PathAlignment {
        let Some(first) = paths.first() else {
            return PathAlignment::default();
        };
        let mut prefix_len = first.len();
        for path in &paths[1..] {
            prefix_len = first
                .bytes()
                .zip(path.bytes())
                .take(prefix_len)
                .take_while(|(a, b)| a == b)
                .count();
        }
        while !first.is_char_boundary(prefix_len) {
            prefix_len -= 1;
        }
        let prefix = &first[..prefix_len];
        let on_boundary = paths
            .iter()
            .all(|p| matches!(p.as_bytes().get(prefix_len), None | Some(b'/')));
        let common = if on_boundary {
            prefix
        } else {
            prefix.rfind('/').map(|i| &prefix[..i]).unwrap_or("")
        };
        let common = match common.trim_end_matches('/') {
            "" if first.starts_with('/') => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        let base = expected_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| common.clone());
        let (aligned, misaligned) = paths.iter().cloned().partition(|p| within(p, &base));
        PathAlignment {
            common_base: common,
            aligned,
            misaligned,
        }
    }

    /// Shell script plus one source list file per job, keyed by file name
    pub fn generate_distcp_scripts(plan: &DistCpPlan) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        let mut script = String::new();
        let _ = writeln!(script, "#!/usr/bin/env sh");
        let _ = writeln!(script);
        let _ = writeln!(script, "# DistCp jobs for database {}", plan.database);
        let _ = writeln!(script, "if [ -z ${{HCFS_BASE_DIR+x}} ]; then");
        let _ = writeln!(script, "  echo \"HCFS_BASE_DIR is unset\"");
        let _ = writeln!(script, "  echo \"Set HCFS_BASE_DIR to the directory holding the source list files\"");
        let _ = writeln!(script, "  exit 1");
        let _ = writeln!(script, "fi");
        let _ = writeln!(script);
        let _ = writeln!(script, "echo \"HCFS_BASE_DIR is set to '$HCFS_BASE_DIR'\"");
        for job in &plan.jobs {
            let _ = writeln!(script);
            let _ = writeln!(script, "# [{}] {}", job.priority, job.name);
            let _ = writeln!(
                script,
                "hadoop distcp {} -f $HCFS_BASE_DIR/{} {}",
                job.options.join(" "),
                job.source_list_file,
                job.target_directory
            );
        }
        files.insert(format!("{}_distcp_script.sh", plan.database), script);

        for (name, paths) in &plan.source_lists {
            let mut content = paths.join("\n");
            content.push('\n');
            files.insert(name.clone(), content);
        }
        files
    }

    pub fn generate_distcp_workbook(plan: &DistCpPlan) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# DistCp Workbook: {}", plan.database);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Database | Jobs | Paths | Estimated Bytes |");
        let _ = writeln!(out, "|:---|---:|---:|---:|");
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            plan.database,
            plan.jobs.len(),
            plan.path_count,
            plan.estimated_bytes
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "| Job Name | Source Paths | Target Directory | Priority |");
        let _ = writeln!(out, "|:---|:---|:---|---:|");
        for job in &plan.jobs {
            let sources = plan
                .source_lists
                .get(&job.source_list_file)
                .map(|paths| paths.join("<br>"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                job.name, sources, job.target_directory, job.priority
            );
        }
        if !plan.issues.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Issues");
            let _ = writeln!(out);
            for issue in &plan.issues {
                let _ = writeln!(out, "- {}", issue);
            }
        }
        out
    }
}

fn within(path: &str, base: &str) -> bool {
    if base == "/" {
        return path.starts_with('/');
    }
    path == base || path.starts_with(&format!("{}/", base))
}

fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) if idx > 0 && !trimmed[..idx].ends_with('/') => trimmed[..idx].to_string(),
        _ => trimmed.to_string(),
    }
}

/// Trim `level` trailing segments from each pair, keeping distinct results
fn consolidate(pairs: Vec<(String, String)>, level: usize) -> Vec<(String, String)> {
    if level == 0 {
        return pairs;
    }
    let mut seen = BTreeSet::new();
    pairs
        .into_iter()
        .map(|(mut source, mut target)| {
            for _ in 0..level {
                source = parent(&source);
                target = parent(&target);
            }
            (source, target)
        })
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

fn estimate_minutes(bytes: u64, recommendations: &DistCpRecommendations) -> u64 {
    let throughput = recommendations.bandwidth_mb * MIB * recommendations.mappers;
    bytes.div_ceil(throughput * 60).max(1)
}
