use serde_json::{Value, json};
use yapper_core::model::{NoteId, TaskFilter, TaskId};
use yapper_core::{Domain, IndexStore, Vault};

use crate::rpc::{
    ListTasksParams, NoteParams, OpenDailyParams, RangeParams, RpcError, RpcResult, TagParams,
    TaskDetailParams, WriteNoteParams, parse_date, parse_params, to_json,
};

/// Route one call to the domain.
pub fn dispatch<V, S>(domain: &Domain<V, S>, method: &str, params: Option<Value>) -> RpcResult<Value>
where
    V: Vault,
    S: IndexStore,
{
    match method {
        "core.reindex" => {
            let stats = domain.reindex_all()?;
            let mut result = json!({ "status": "ok" });
            if let (Value::Object(out), Value::Object(fields)) = (&mut result, to_json(stats)?) {
                out.extend(fields);
            }
            Ok(result)
        }
        "core.list_tasks" => {
            let params: ListTasksParams = parse_params(params)?;
            let filter = TaskFilter {
                statuses: params.statuses()?,
                tags: params.tags.unwrap_or_default(),
                text_search: params.text_search.filter(|s| !s.trim().is_empty()),
                touched_since: params.touched_since.as_deref().map(parse_date).transpose()?,
            };
            to_json(domain.list_tasks(&filter))
        }
        "core.task_detail" => {
            let params: TaskDetailParams = parse_params(params)?;
            let detail = domain
                .task_detail(&TaskId::new(params.task_id.as_str()))
                .ok_or_else(|| RpcError::not_found(format!("task not found: {}", params.task_id)))?;
            to_json(detail)
        }
        "core.items_for_tag" => {
            let params: TagParams = parse_params(params)?;
            let items = domain
                .items_for_tag(&params.tag)
                .ok_or_else(|| RpcError::not_found(format!("tag not found: {}", params.tag)))?;
            to_json(items)
        }
        "core.list_tags" => to_json(domain.list_tags()),
        "core.notes_in_range" => {
            let params: RangeParams = parse_params(params)?;
            to_json(domain.notes_in_range(params.range()?))
        }
        "core.weekly_summary" => {
            let params: RangeParams = parse_params(params)?;
            to_json(domain.weekly_summary(params.range()?))
        }
        "core.open_daily" => {
            let params: OpenDailyParams = parse_params(params)?;
            to_json(domain.open_daily(parse_date(&params.date)?)?)
        }
        "core.read_note" => {
            let params: NoteParams = parse_params(params)?;
            to_json(domain.read_note(&NoteId::new(params.note_id))?)
        }
        "core.write_note" => {
            let params: WriteNoteParams = parse_params(params)?;
            to_json(domain.write_note(&NoteId::new(params.note_id), &params.content)?)
        }
        _ => Err(RpcError::MethodNotFound(method.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::{TempDir, tempdir};
    use yapper_core::{
        DomainOptions, FileSystemVault, InMemoryIndexStore, ParserStrategy, VaultIndexManager,
    };

    use super::*;
    use crate::rpc::{INVALID_PARAMS, METHOD_NOT_FOUND, SERVER_ERROR};

    type TestDomain = Domain<FileSystemVault, InMemoryIndexStore>;

    fn domain_with(files: &[(&str, &str)]) -> (TempDir, TestDomain) {
        let tmp = tempdir().unwrap();
        for (rel, content) in files {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let vault = Arc::new(FileSystemVault::new(tmp.path()).unwrap());
        let manager = VaultIndexManager::new(
            vault,
            Arc::new(InMemoryIndexStore::new()),
            ParserStrategy::Regex.build(),
        );
        let domain = Domain::new(manager, DomainOptions::default());
        domain.reindex_all().unwrap();
        (tmp, domain)
    }

    const NOTE: &str = "## Tasks\n- [ ] Ship it #work [T-1]\n- [x] Done thing [T-2]\n\n## Log\n- 09:00 Started [T-1]\n";

    #[test]
    fn reindex_reports_status_and_stats() {
        let (_tmp, domain) = domain_with(&[("2024-05-02.md", NOTE)]);
        let result = dispatch(&domain, "core.reindex", None).unwrap();
        assert_eq!(result["status"], "ok");
        assert_eq!(result["notes_indexed"], 1);
        assert_eq!(result["tasks"], 2);
    }

    #[test]
    fn list_tasks_filters_by_status() {
        let (_tmp, domain) = domain_with(&[("2024-05-02.md", NOTE)]);
        let result =
            dispatch(&domain, "core.list_tasks", Some(json!({ "status": ["done"] }))).unwrap();
        let ids: Vec<_> = result.as_array().unwrap().iter().map(|t| t["id"].clone()).collect();
        assert_eq!(ids, vec![json!("T-2")]);

        let err = dispatch(&domain, "core.list_tasks", Some(json!({ "touched_since": "soon" })))
            .unwrap_err();
        assert_eq!(err.code(), INVALID_PARAMS);
    }

    #[test]
    fn task_detail_includes_backlinks() {
        let (_tmp, domain) = domain_with(&[("2024-05-02.md", NOTE)]);
        let result =
            dispatch(&domain, "core.task_detail", Some(json!({ "task_id": "T-1" }))).unwrap();
        assert_eq!(result["task"]["title"], "Ship it");
        assert_eq!(result["mentions"].as_array().unwrap().len(), 1);
        assert_eq!(result["log_entries"][0]["line"], 6);
    }

    #[test]
    fn unknown_lookups_are_not_found() {
        let (_tmp, domain) = domain_with(&[("2024-05-02.md", NOTE)]);
        for (method, params) in [
            ("core.task_detail", json!({ "task_id": "T-404" })),
            ("core.items_for_tag", json!({ "tag": "nothing" })),
            ("core.read_note", json!({ "note_id": "missing.md" })),
        ] {
            let err = dispatch(&domain, method, Some(params)).unwrap_err();
            assert_eq!(err.code(), SERVER_ERROR, "{method}");
            assert_eq!(err.data(), Some(json!({ "kind": "not_found" })), "{method}");
        }
    }

    #[test]
    fn write_note_rejects_paths_outside_the_index() {
        let (tmp, domain) = domain_with(&[]);
        for note_id in ["../outside.md", ".drafts/plan.md", "target/notes.md"] {
            let err = dispatch(
                &domain,
                "core.write_note",
                Some(json!({ "note_id": note_id, "content": "x" })),
            )
            .unwrap_err();
            assert_eq!(err.code(), INVALID_PARAMS, "{note_id}");
        }
        assert!(!tmp.path().join(".drafts").exists());
    }

    #[test]
    fn written_note_survives_full_reindex() {
        let (_tmp, domain) = domain_with(&[]);
        let params = json!({ "note_id": "drafts/plan.md", "content": "## Tasks\n- [ ] Plan [T-5]\n" });
        dispatch(&domain, "core.write_note", Some(params)).unwrap();
        dispatch(&domain, "core.reindex", None).unwrap();

        let note =
            dispatch(&domain, "core.read_note", Some(json!({ "note_id": "drafts/plan.md" })))
                .unwrap();
        assert_eq!(note["content"], "## Tasks\n- [ ] Plan [T-5]\n");
    }

    #[test]
    fn open_daily_then_list_tags() {
        let (tmp, domain) = domain_with(&[("2024-05-02.md", NOTE)]);
        let note =
            dispatch(&domain, "core.open_daily", Some(json!({ "date": "2024-05-09" }))).unwrap();
        assert_eq!(note["id"], "2024-05-09.md");
        assert!(tmp.path().join("2024-05-09.md").exists());

        assert_eq!(dispatch(&domain, "core.list_tags", None).unwrap(), json!(["work"]));
    }

    #[test]
    fn unknown_method() {
        let (_tmp, domain) = domain_with(&[]);
        let err = dispatch(&domain, "core.nope", None).unwrap_err();
        assert_eq!(err.code(), METHOD_NOT_FOUND);
    }
}
