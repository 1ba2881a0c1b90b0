//! Project discovery routes.
//!
//! A project is a directory containing an initial program
//! (`initial_program.*`) and an evaluator (`evaluator.*`); a
//! `config.json` is picked up when present.

use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ApiError;

/// One discovered project.
#[derive(Debug, Serialize)]
pub struct Project {
    /// Directory name.
    pub name: String,
    /// Absolute-ish project directory.
    pub path: PathBuf,
    /// Initial program artifact.
    pub initial_program: PathBuf,
    /// Evaluator artifact.
    pub evaluator: PathBuf,
    /// Project config file, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

/// Query string naming the directory to scan.
#[derive(Debug, Deserialize)]
pub struct ProjectsQuery {
    /// Directory whose children are candidate projects.
    pub base_dir: PathBuf,
}

fn find_by_stem(dir: &FsPath, stem: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir).ok()?.find_map(|entry| {
        let path = entry.ok()?.path();
        (path.is_file() && path.file_stem().is_some_and(|s| s == stem)).then_some(path)
    })
}

fn inspect(dir: &FsPath) -> Option<Project> {
    let initial_program = find_by_stem(dir, "initial_program")?;
    let evaluator = find_by_stem(dir, "evaluator")?;
    Some(Project {
        name: dir.file_name()?.to_string_lossy().into_owned(),
        path: dir.to_path_buf(),
        initial_program,
        evaluator,
        config: find_by_stem(dir, "config"),
    })
}

fn discover(base_dir: &FsPath) -> Vec<Project> {
    let mut projects: Vec<Project> = WalkDir::new(base_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| inspect(e.path()))
        .collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    projects
}

/// `GET /api/projects?base_dir=`
pub async fn list(Query(query): Query<ProjectsQuery>) -> Result<Json<Vec<Project>>, ApiError> {
    if !query.base_dir.is_dir() {
        return Err(ApiError::not_found(format!(
            "Directory not found: {}",
            query.base_dir.display()
        )));
    }
    Ok(Json(discover(&query.base_dir)))
}

/// `GET /api/projects/{name}?base_dir=`
pub async fn detail(
    Path(name): Path<String>,
    Query(query): Query<ProjectsQuery>,
) -> Result<Json<Project>, ApiError> {
    let dir = query.base_dir.join(&name);
    inspect(&dir)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Project {name} not found")))
}
