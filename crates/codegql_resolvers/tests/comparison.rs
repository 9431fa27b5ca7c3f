//! Repository comparisons and patch previews.

use codegql_backend::Seed;
use codegql_core::{encode_int_cursor, Actor, RequestContext};
use codegql_resolvers::{Request, Response, Schema, Services};
use serde_json::{json, Value};

const REPO: &str = "github.com/acme/app";
const BASE: &str = "1111111111111111111111111111111111111111";
const MIDDLE: &str = "2222222222222222222222222222222222222222";
const HEAD: &str = "3333333333333333333333333333333333333333";

const README_DIFF: &str = "\
diff --git a/README.md b/README.md
index 3b18e51..a2c4f0d 100644
--- a/README.md
+++ b/README.md
@@ -1,3 +1,3 @@ # App
 # App
-old intro
+new intro
 footer
";

const MAIN_DIFF: &str = "\
diff --git a/src/main.rs b/src/main.rs
index 1c2a3b4..5d6e7f8 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,1 +1,2 @@
 fn main() {}
+// entry point
";

fn commit(id: &str, message: &str, parent: Option<&str>) -> Value {
    json!({
        "id": id,
        "author": {"name": "Alice", "email": "alice@acme.dev", "date": "2024-03-01T12:00:00Z"},
        "message": message,
        "parents": parent.into_iter().collect::<Vec<_>>(),
    })
}

fn schema() -> Schema {
    let seed: Seed = serde_json::from_value(json!({
        "users": [{"id": 1, "username": "alice"}],
        "repos": [{"id": 7, "name": REPO}],
        "git": [{
            "repo": REPO,
            "commits": [
                commit(BASE, "Initial commit", None),
                commit(MIDDLE, "Reword intro\n\nThe old one was stale.", Some(BASE)),
                commit(HEAD, "Document main", Some(MIDDLE)),
            ],
            "refs": {"main": HEAD, "v1": BASE},
            "files": [
                {"commit": BASE, "path": "README.md", "content": "# App\nold intro\nfooter\n"},
                {"commit": HEAD, "path": "README.md", "content": "# App\nnew intro\nfooter\n"},
                {"commit": BASE, "path": "src/main.rs", "content": "fn main() {}\n"},
                {"commit": HEAD, "path": "src/main.rs", "content": "fn main() {}\n// entry point\n"}
            ],
            "diffs": [
                {"base": BASE, "head": HEAD, "path": "README.md", "diff": README_DIFF},
                {"base": BASE, "head": HEAD, "path": "src/main.rs", "diff": MAIN_DIFF}
            ]
        }]
    }))
    .unwrap();
    Schema::new(Services::memory(&seed))
}

async fn query(schema: &Schema, comparison: Value) -> Response {
    schema
        .execute(
            Request::query(json!({
                "repository": {"args": {"name": REPO}, "fields": comparison}
            })),
            RequestContext::new(Actor::user(1)),
        )
        .await
}

#[tokio::test]
async fn test_comparison_range_and_commits() {
    let schema = schema();
    let response = query(
        &schema,
        json!({
            "comparison": {
                "args": {"base": "v1", "head": "main"},
                "fields": {
                    "__typename": true,
                    "range": {"expr": true, "baseRevSpec": {"oid": true}, "headRevSpec": {"expr": true, "oid": true}},
                    "commits": {
                        "nodes": {"abbreviatedOID": true, "subject": true, "body": true, "parents": {"oid": true}},
                        "totalCount": true
                    }
                }
            }
        }),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    let comparison = &response.data["repository"]["comparison"];
    assert_eq!(comparison["__typename"], "RepositoryComparison");
    assert_eq!(comparison["range"]["expr"], "v1...main");
    assert_eq!(comparison["range"]["baseRevSpec"]["oid"], BASE);
    assert_eq!(comparison["range"]["headRevSpec"], json!({"expr": "main", "oid": HEAD}));

    let commits = &comparison["commits"];
    assert_eq!(commits["totalCount"], 2);
    assert_eq!(
        commits["nodes"],
        json!([
            {"abbreviatedOID": "3333333", "subject": "Document main", "body": null, "parents": [{"oid": MIDDLE}]},
            {"abbreviatedOID": "2222222", "subject": "Reword intro", "body": "The old one was stale.", "parents": [{"oid": BASE}]}
        ])
    );
}

#[tokio::test]
async fn test_file_diffs_page_by_offset() {
    let schema = schema();
    let page = |after: Option<String>| {
        let mut args = json!({"first": 1});
        if let Some(after) = after {
            args["after"] = json!(after);
        }
        query(
            &schema,
            json!({
                "comparison": {
                    "args": {"base": "v1", "head": "main"},
                    "fields": {
                        "fileDiffs": {
                            "args": args,
                            "fields": {
                                "nodes": {"newPath": true, "stat": {"added": true, "deleted": true}},
                                "totalCount": true,
                                "diffStat": {"added": true, "deleted": true},
                                "pageInfo": {"hasNextPage": true, "endCursor": true}
                            }
                        }
                    }
                }
            }),
        )
    };

    let first = page(None).await;
    assert!(first.is_ok(), "{:?}", first.errors);
    let diffs = &first.data["repository"]["comparison"]["fileDiffs"];
    assert_eq!(
        diffs["nodes"],
        json!([{"newPath": "README.md", "stat": {"added": 1, "deleted": 1}}])
    );
    assert_eq!(diffs["totalCount"], 2);
    assert_eq!(diffs["diffStat"], json!({"added": 2, "deleted": 1}));
    assert_eq!(diffs["pageInfo"]["hasNextPage"], true);
    assert_eq!(diffs["pageInfo"]["endCursor"], json!(encode_int_cursor(1)));

    let second = page(Some(encode_int_cursor(1))).await;
    let diffs = &second.data["repository"]["comparison"]["fileDiffs"];
    assert_eq!(diffs["nodes"], json!([{"newPath": "src/main.rs", "stat": {"added": 1, "deleted": 0}}]));
    assert_eq!(diffs["pageInfo"]["hasNextPage"], false);
}

#[tokio::test]
async fn test_file_diff_hunks_and_highlighting() {
    let schema = schema();
    let response = query(
        &schema,
        json!({
            "comparison": {
                "args": {"base": "v1", "head": "main"},
                "fields": {
                    "fileDiffs": {
                        "args": {"paths": ["README.md"]},
                        "fields": {
                            "nodes": {
                                "oldFile": {"content": true},
                                "newFile": {"name": true, "content": true},
                                "hunks": {
                                    "oldRange": {"startLine": true, "lines": true},
                                    "section": true,
                                    "oldNoNewlineAt": true,
                                    "highlight": {"aborted": true, "lines": {"kind": true}}
                                }
                            }
                        }
                    }
                }
            }
        }),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    let nodes = &response.data["repository"]["comparison"]["fileDiffs"]["nodes"];
    assert_eq!(nodes.as_array().unwrap().len(), 1);
    let file = &nodes[0];
    assert_eq!(file["oldFile"]["content"], "# App\nold intro\nfooter\n");
    assert_eq!(file["newFile"]["name"], "README.md");
    assert_eq!(file["newFile"]["content"], "# App\nnew intro\nfooter\n");

    let hunk = &file["hunks"][0];
    assert_eq!(hunk["oldRange"], json!({"startLine": 1, "lines": 3}));
    assert_eq!(hunk["section"], "# App");
    assert_eq!(hunk["oldNoNewlineAt"], false);
    assert_eq!(hunk["highlight"]["aborted"], false);
    assert_eq!(
        hunk["highlight"]["lines"],
        json!([
            {"kind": "UNCHANGED"},
            {"kind": "DELETED"},
            {"kind": "ADDED"},
            {"kind": "UNCHANGED"}
        ])
    );
}

#[tokio::test]
async fn test_preview_comparison_applies_patch() {
    let schema = schema();
    let response = query(
        &schema,
        json!({
            "previewComparison": {
                "args": {"base": "v1", "patch": README_DIFF},
                "fields": {
                    "__typename": true,
                    "range": {"expr": true, "headRevSpec": true},
                    "commits": {"totalCount": true},
                    "fileDiffs": {
                        "fields": {
                            "nodes": {"newFile": {"__typename": true, "content": true}},
                            "rawDiff": true
                        }
                    }
                }
            }
        }),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    let preview = &response.data["repository"]["previewComparison"];
    assert_eq!(preview["__typename"], "PreviewRepositoryComparison");
    assert_eq!(preview["range"], json!({"expr": "v1...", "headRevSpec": null}));
    assert_eq!(preview["commits"]["totalCount"], 0);
    let diffs = &preview["fileDiffs"];
    assert_eq!(diffs["rawDiff"], README_DIFF);
    assert_eq!(diffs["nodes"][0]["newFile"]["__typename"], "VirtualFile");
    assert_eq!(
        diffs["nodes"][0]["newFile"]["content"],
        "# App\nnew intro\nfooter\n"
    );
}

#[tokio::test]
async fn test_unknown_revision_nulls_the_comparison() {
    let schema = schema();
    let response = query(
        &schema,
        json!({
            "comparison": {"args": {"base": "nope", "head": "main"}, "fields": {"range": {"expr": true}}}
        }),
    )
    .await;
    assert_eq!(response.data["repository"]["comparison"], Value::Null);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].path,
        vec![
            codegql_core::PathSegment::Field("repository".into()),
            codegql_core::PathSegment::Field("comparison".into()),
        ]
    );
}
