//! Applied-tree materialization.
//!
//! Copies the live typification → taxonomy → branch hierarchy (with its
//! sources) into the immutable per-release snapshot, reusing nodes already
//! materialized for the release so shared parents are copied exactly once.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{applied, tree};
use crate::db::DatabaseError;
use crate::models::{
    AppliedBranch, AppliedSource, AppliedTaxonomy, AppliedTree, AppliedTypification, BranchContext,
    SourceParent,
};

/// Materialize the Applied Tree for one release from the live hierarchy.
///
/// Every created node is persisted immediately, and a duplicate-detection
/// lookup runs before every typification/taxonomy insert, so two branches
/// sharing a parent reuse the same applied row.
pub fn build_applied_tree(
    conn: &Connection,
    release_id: &Uuid,
    document_id: &Uuid,
) -> Result<AppliedTree, DatabaseError> {
    let scoped = tree::branches_for_document(conn, document_id)?;
    let mut result = AppliedTree::default();

    for entry in scoped {
        let applied_typ = ensure_applied_typification(conn, release_id, &entry.typification)?;
        let applied_tax =
            ensure_applied_taxonomy(conn, release_id, &applied_typ.id, &entry.taxonomy)?;

        // Branches are leaves: each scoped branch becomes exactly one
        // applied branch, so no reuse lookup is needed here.
        let applied_branch = AppliedBranch {
            id: Uuid::new_v4(),
            release_id: *release_id,
            applied_taxonomy_id: applied_tax.id,
            original_id: Some(entry.branch.id),
            title: entry.branch.title.clone(),
            description: entry.branch.description.clone(),
            feedback: None,
            fulfilled: None,
            score: None,
            entity_mapping: None,
        };
        applied::insert_applied_branch(conn, &applied_branch)?;

        if !result.typifications.iter().any(|t| t.id == applied_typ.id) {
            result.typifications.push(applied_typ);
        }
        if !result.taxonomies.iter().any(|t| t.id == applied_tax.id) {
            result.taxonomies.push(applied_tax);
        }
        result.branches.push(applied_branch);
    }

    tracing::info!(
        release_id = %release_id,
        typifications = result.typifications.len(),
        taxonomies = result.taxonomies.len(),
        branches = result.branches.len(),
        "Applied tree materialized"
    );

    Ok(result)
}

fn ensure_applied_typification(
    conn: &Connection,
    release_id: &Uuid,
    original: &crate::models::Typification,
) -> Result<AppliedTypification, DatabaseError> {
    if let Some(existing) = applied::find_applied_typification(conn, release_id, &original.id)? {
        return Ok(existing);
    }

    let applied_typ = AppliedTypification {
        id: Uuid::new_v4(),
        release_id: *release_id,
        original_id: Some(original.id),
        name: original.name.clone(),
    };
    applied::insert_applied_typification(conn, &applied_typ)?;

    for source in tree::sources_for_typification(conn, &original.id)? {
        applied::insert_applied_source(
            conn,
            &AppliedSource {
                id: Uuid::new_v4(),
                release_id: *release_id,
                parent_kind: SourceParent::Typification,
                parent_id: applied_typ.id,
                original_id: Some(source.id),
                name: source.name,
                description: source.description,
            },
        )?;
    }

    Ok(applied_typ)
}

fn ensure_applied_taxonomy(
    conn: &Connection,
    release_id: &Uuid,
    applied_typification_id: &Uuid,
    original: &crate::models::Taxonomy,
) -> Result<AppliedTaxonomy, DatabaseError> {
    if let Some(existing) = applied::find_applied_taxonomy(conn, release_id, &original.id)? {
        return Ok(existing);
    }

    let applied_tax = AppliedTaxonomy {
        id: Uuid::new_v4(),
        release_id: *release_id,
        applied_typification_id: *applied_typification_id,
        original_id: Some(original.id),
        title: original.title.clone(),
        description: original.description.clone(),
    };
    applied::insert_applied_taxonomy(conn, &applied_tax)?;

    for source in tree::sources_for_taxonomy(conn, &original.id)? {
        applied::insert_applied_source(
            conn,
            &AppliedSource {
                id: Uuid::new_v4(),
                release_id: *release_id,
                parent_kind: SourceParent::Taxonomy,
                parent_id: applied_tax.id,
                original_id: Some(source.id),
                name: source.name,
                description: source.description,
            },
        )?;
    }

    Ok(applied_tax)
}

/// Denormalize the snapshot into one self-contained context per branch,
/// the value objects the evaluation stage flows through its transforms.
pub fn branch_contexts(
    conn: &Connection,
    tree: &AppliedTree,
) -> Result<Vec<BranchContext>, DatabaseError> {
    let mut contexts = Vec::with_capacity(tree.branches.len());

    for branch in &tree.branches {
        let taxonomy = tree
            .taxonomies
            .iter()
            .find(|t| t.id == branch.applied_taxonomy_id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "AppliedTaxonomy".into(),
                id: branch.applied_taxonomy_id.to_string(),
            })?;
        let typification = tree
            .typifications
            .iter()
            .find(|t| t.id == taxonomy.applied_typification_id)
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "AppliedTypification".into(),
                id: taxonomy.applied_typification_id.to_string(),
            })?;

        let mut source_names =
            applied::applied_source_names(conn, SourceParent::Typification, &typification.id)?;
        source_names
            .extend(applied::applied_source_names(conn, SourceParent::Taxonomy, &taxonomy.id)?);

        contexts.push(BranchContext {
            applied_branch_id: branch.id,
            title: branch.title.clone(),
            description: branch.description.clone(),
            taxonomy_title: taxonomy.title.clone(),
            typification_name: typification.name.clone(),
            source_names,
        });
    }

    Ok(contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::release::insert_release;
    use crate::models::DocumentRelease;
    use crate::testutil::{seed_compliance_tree, seed_release};

    fn seeded(conn: &Connection) -> (Uuid, Uuid) {
        let (document, _, _, _) = seed_compliance_tree(conn);
        let release = seed_release(conn, &document.id, "/tmp/r.txt");
        (release.id, document.id)
    }

    #[test]
    fn builds_full_tree_for_release() {
        let conn = open_memory_database().unwrap();
        let (release_id, document_id) = seeded(&conn);

        let tree = build_applied_tree(&conn, &release_id, &document_id).unwrap();
        assert_eq!(tree.typifications.len(), 1);
        assert_eq!(tree.taxonomies.len(), 1);
        assert_eq!(tree.branches.len(), 2);

        // Sources were copied at both levels.
        let typ_sources = applied::applied_source_names(
            &conn,
            SourceParent::Typification,
            &tree.typifications[0].id,
        )
        .unwrap();
        assert_eq!(typ_sources, vec!["Resolution 4.955/2021"]);
        let tax_sources =
            applied::applied_source_names(&conn, SourceParent::Taxonomy, &tree.taxonomies[0].id)
                .unwrap();
        assert_eq!(tax_sources, vec!["Circular 3.930/2019"]);
    }

    #[test]
    fn shared_parents_materialized_once() {
        // Two branches share the typification and taxonomy: building the
        // tree must not produce duplicate parent rows.
        let conn = open_memory_database().unwrap();
        let (release_id, document_id) = seeded(&conn);

        build_applied_tree(&conn, &release_id, &document_id).unwrap();

        let typ_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM applied_typifications WHERE release_id = ?1",
                [release_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(typ_count, 1);

        let tax_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM applied_taxonomies WHERE release_id = ?1",
                [release_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tax_count, 1);
    }

    #[test]
    fn rebuilding_reuses_existing_nodes() {
        let conn = open_memory_database().unwrap();
        let (release_id, document_id) = seeded(&conn);

        build_applied_tree(&conn, &release_id, &document_id).unwrap();
        build_applied_tree(&conn, &release_id, &document_id).unwrap();

        let typ_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM applied_typifications WHERE release_id = ?1",
                [release_id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(typ_count, 1, "second build must reuse the applied typification");
    }

    #[test]
    fn separate_releases_get_separate_snapshots() {
        let conn = open_memory_database().unwrap();
        let (release_a, document_id) = seeded(&conn);
        let release_b = {
            let release = DocumentRelease {
                id: Uuid::new_v4(),
                document_id,
                file_path: "/tmp/r2.txt".into(),
                description: None,
                entity_mapping: None,
                created_by: None,
                created_at: chrono::Utc::now().naive_utc(),
                deleted: false,
            };
            insert_release(&conn, &release).unwrap();
            release.id
        };

        build_applied_tree(&conn, &release_a, &document_id).unwrap();
        build_applied_tree(&conn, &release_b, &document_id).unwrap();

        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM applied_typifications", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 2, "each release owns its own applied typification");
    }

    #[test]
    fn branch_contexts_carry_hierarchy_and_sources() {
        let conn = open_memory_database().unwrap();
        let (release_id, document_id) = seeded(&conn);

        let tree = build_applied_tree(&conn, &release_id, &document_id).unwrap();
        let contexts = branch_contexts(&conn, &tree).unwrap();

        assert_eq!(contexts.len(), 2);
        for ctx in &contexts {
            assert_eq!(ctx.taxonomy_title, "Capital disclosure");
            assert_eq!(ctx.typification_name, "Prudential reporting");
            assert_eq!(
                ctx.source_names,
                vec!["Resolution 4.955/2021", "Circular 3.930/2019"]
            );
        }
    }
}
