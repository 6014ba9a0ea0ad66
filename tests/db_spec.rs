use interlinear::chain::LayerChain;
use interlinear::db::{Database, FeatureStore, QuerySource, ResultTable};
use interlinear::error::FormatError;
use interlinear::models::*;
use speculate2::speculate;

fn add_typed_unit(db: &Database, id: &str, unit_type: &str, parent: Option<&str>, index: i64) {
    db.transaction(|store| {
        store.set_type(id, unit_type)?;
        if let Some(parent) = parent {
            store.set_parent(id, parent)?;
        }
        store.set_feature(id, META_TIER, INDEX_FEATURE, &FeatureValue::Int(index))
    })
    .expect("Failed to add unit");
}

fn add_unit(db: &Database, id: &str, level: Level, parent: Option<&str>, index: i64) {
    add_typed_unit(db, id, level.as_str(), parent, index);
}

/// t1 > p1 > (s1 #2, s2 #1), t1 > p2 > s3 #1, t1 > p3 (no phrases)
fn seed_text(db: &Database) {
    add_unit(db, "t1", Level::Text, None, 1);
    add_unit(db, "p1", Level::Paragraph, Some("t1"), 1);
    add_unit(db, "p2", Level::Paragraph, Some("t1"), 2);
    add_unit(db, "p3", Level::Paragraph, Some("t1"), 3);
    add_unit(db, "s1", Level::Phrase, Some("p1"), 2);
    add_unit(db, "s2", Level::Phrase, Some("p1"), 1);
    add_unit(db, "s3", Level::Phrase, Some("p2"), 1);
}

fn ids(table: &ResultTable, level: Level) -> Vec<Option<String>> {
    table
        .rows()
        .iter()
        .map(|row| row.get(level).map(str::to_string))
        .collect()
}

fn chain(levels: &[Level]) -> LayerChain {
    LayerChain::nested(levels, FeatureKey::index())
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "units" {
        describe "set_type" {
            it "creates a unit" {
                let mut db = db;
                db.set_type("w1", "word").expect("Failed to set type");

                let unit = db.get_unit("w1").expect("Query failed").expect("Unit missing");
                assert_eq!(unit.unit_type, "word");
                assert!(unit.parent_id.is_none());
                assert!(unit.index.is_none());
            }

            it "is idempotent" {
                let mut db = db;
                db.set_type("w1", "word").expect("Failed to set type");
                db.set_type("w1", "word").expect("Failed to set type");
                assert_eq!(db.count_units().expect("Query failed"), 1);
            }

            it "replaces the type of an existing unit" {
                let mut db = db;
                db.set_type("u", "word").expect("Failed to set type");
                db.set_type("u", "morph").expect("Failed to set type");

                let unit = db.get_unit("u").expect("Query failed").expect("Unit missing");
                assert_eq!(unit.unit_type, "morph");
            }
        }

        describe "set_parent" {
            it "links a unit to its parent" {
                add_unit(&db, "p", Level::Paragraph, None, 1);
                add_unit(&db, "s", Level::Phrase, Some("p"), 1);

                let unit = db.get_unit("s").expect("Query failed").expect("Unit missing");
                assert_eq!(unit.parent_id.as_deref(), Some("p"));
                assert_eq!(unit.index, Some(1));
            }

            it "fails for an unknown unit" {
                let mut db = db;
                db.set_type("p", "paragraph").expect("Failed to set type");
                assert!(db.set_parent("missing", "p").is_err());
            }

            it "fails for an unknown parent" {
                let mut db = db;
                db.set_type("s", "phrase").expect("Failed to set type");
                assert!(db.set_parent("s", "missing").is_err());
            }
        }

        describe "get_children" {
            it "orders children by sibling index" {
                seed_text(&db);

                let children: Vec<String> = db
                    .get_children("p1")
                    .expect("Query failed")
                    .into_iter()
                    .map(|u| u.id)
                    .collect();
                assert_eq!(children, vec!["s2", "s1"]);
            }
        }

        describe "get_unit_tree" {
            it "nests units under their parents" {
                seed_text(&db);

                let tree = db.get_unit_tree().expect("Query failed");
                assert_eq!(tree.len(), 1);
                assert_eq!(tree[0].unit.id, "t1");
                assert_eq!(tree[0].children.len(), 3);
                assert_eq!(tree[0].children[0].children[0].unit.id, "s2");
            }
        }
    }

    describe "features" {
        it "stores typed values" {
            let mut db = db;
            db.set_type("w", "word").expect("Failed to set type");
            db.set_feature("w", "FlexText/en", "gls", &FeatureValue::from("dog"))
                .expect("Failed to set feature");
            db.set_feature("w", META_TIER, INDEX_FEATURE, &FeatureValue::Int(4))
                .expect("Failed to set feature");

            let features = db.get_features("w").expect("Query failed");
            assert_eq!(features.len(), 2);
            assert_eq!(features[0].key, FeatureKey::new("FlexText/en", "gls"));
            assert_eq!(features[0].value, FeatureValue::from("dog"));
            assert_eq!(features[1].value, FeatureValue::Int(4));
        }

        it "replaces the value of an existing feature" {
            let key = FeatureKey::new("FlexText/en", "gls");
            let mut db = db;
            db.set_type("w", "word").expect("Failed to set type");
            db.set_feature("w", &key.tier, &key.name, &FeatureValue::from("dog"))
                .expect("Failed to set feature");
            db.set_feature("w", &key.tier, &key.name, &FeatureValue::Int(7))
                .expect("Failed to set feature");

            assert_eq!(db.get_features("w").expect("Query failed").len(), 1);
            assert_eq!(
                db.get_feature("w", &key).expect("Query failed"),
                Some(FeatureValue::Int(7))
            );
        }

        it "requires the unit to exist" {
            let mut db = db;
            let result = db.set_feature("missing", "FlexText/en", "gls", &FeatureValue::from("x"));
            assert!(result.is_err());
        }
    }

    describe "transaction" {
        it "commits when the closure succeeds" {
            db.transaction(|store| {
                store.set_type("t", "interlinear-text")?;
                store.set_feature("t", META_TIER, INDEX_FEATURE, &FeatureValue::Int(1))
            })
            .expect("Transaction failed");

            assert_eq!(db.count_units().expect("Query failed"), 1);
        }

        it "rolls back when the closure fails" {
            let result: anyhow::Result<()> = db.transaction(|store| {
                store.set_type("t", "interlinear-text")?;
                Err(FormatError::IdentityCollision("t".to_string()).into())
            });

            assert!(result.is_err());
            assert_eq!(db.count_units().expect("Query failed"), 0);
        }

        it "sees its own writes" {
            let seen = db
                .transaction(|store| {
                    store.set_type("t", "interlinear-text")?;
                    store.has_unit("t")
                })
                .expect("Transaction failed");
            assert!(seen);
        }
    }

    describe "results" {
        it "returns one row per path in document order" {
            seed_text(&db);

            let table = db
                .results(&chain(&[Level::Text, Level::Paragraph, Level::Phrase]))
                .expect("Query failed");

            assert_eq!(
                ids(&table, Level::Phrase),
                vec![Some("s2".to_string()), Some("s1".to_string()), Some("s3".to_string()), None]
            );
            assert_eq!(
                ids(&table, Level::Paragraph),
                vec![
                    Some("p1".to_string()),
                    Some("p1".to_string()),
                    Some("p2".to_string()),
                    Some("p3".to_string()),
                ]
            );
        }

        it "keeps units without children at the next level" {
            add_unit(&db, "t1", Level::Text, None, 1);

            let table = db
                .results(&chain(&[Level::Text, Level::Paragraph]))
                .expect("Query failed");

            assert_eq!(table.len(), 1);
            assert_eq!(table.rows()[0].get(Level::Text), Some("t1"));
            assert_eq!(table.rows()[0].id_for(Level::Paragraph), "paragraph");
        }

        it "joins across skipped levels in document order" {
            seed_text(&db);
            let mut skipped = chain(&[Level::Text, Level::Paragraph, Level::Phrase]);
            skipped.skip(&["paragraph"]);

            let table = db.results(&skipped).expect("Query failed");

            assert_eq!(
                ids(&table, Level::Phrase),
                vec![Some("s2".to_string()), Some("s1".to_string()), Some("s3".to_string())]
            );
            assert!(table.rows().iter().all(|row| row.get(Level::Paragraph).is_none()));
        }

        it "starts at the selected root" {
            seed_text(&db);
            add_unit(&db, "t2", Level::Text, None, 2);
            add_unit(&db, "p4", Level::Paragraph, Some("t2"), 1);
            add_unit(&db, "s4", Level::Phrase, Some("p4"), 1);

            let mut rooted = chain(&[Level::Text, Level::Paragraph, Level::Phrase]);
            rooted.select_root("phrase").expect("Unknown root");

            let table = db.results(&rooted).expect("Query failed");
            assert_eq!(
                ids(&table, Level::Phrase),
                vec![
                    Some("s2".to_string()),
                    Some("s1".to_string()),
                    Some("s3".to_string()),
                    Some("s4".to_string()),
                ]
            );
        }

        it "carries the features of every referenced unit" {
            let mut db = db;
            seed_text(&db);
            db.set_feature("s1", "FlexText/en", "txt", &FeatureValue::from("Hello"))
                .expect("Failed to set feature");

            let table = db
                .results(&chain(&[Level::Text, Level::Paragraph, Level::Phrase]))
                .expect("Query failed");

            let features = table.features("s1").expect("Features missing");
            assert_eq!(
                features.get(&FeatureKey::new("FlexText/en", "txt")),
                Some(&FeatureValue::from("Hello"))
            );
            assert_eq!(features.get(&FeatureKey::index()), Some(&FeatureValue::Int(2)));
        }

        it "reads a level from its mapped unit type" {
            add_unit(&db, "t1", Level::Text, None, 1);
            add_unit(&db, "p1", Level::Paragraph, Some("t1"), 1);
            add_typed_unit(&db, "s1", "sentence", Some("p1"), 2);
            add_typed_unit(&db, "s2", "sentence", Some("p1"), 1);

            let mut mapped = chain(&[Level::Text, Level::Paragraph, Level::Phrase]);
            mapped.map_type(Level::Phrase, "sentence");

            let table = db.results(&mapped).expect("Query failed");
            assert_eq!(
                ids(&table, Level::Phrase),
                vec![Some("s2".to_string()), Some("s1".to_string())]
            );
        }

        it "returns nothing for an empty chain" {
            seed_text(&db);
            let table = db.results(&LayerChain::default()).expect("Query failed");
            assert!(table.is_empty());
        }
    }

    describe "feature_keys" {
        it "lists sorted keys under a tier prefix for one unit type" {
            let mut db = db;
            seed_text(&db);
            db.set_feature("s1", "FlexText/fr", "gls", &FeatureValue::from("a"))
                .expect("Failed to set feature");
            db.set_feature("s2", "FlexText/en", "txt", &FeatureValue::from("b"))
                .expect("Failed to set feature");
            db.set_feature("s3", "FlexText/en", "gls", &FeatureValue::from("c"))
                .expect("Failed to set feature");
            db.set_feature("p1", "FlexText/en", "note", &FeatureValue::from("d"))
                .expect("Failed to set feature");

            let keys = db.feature_keys("phrase", "FlexText").expect("Query failed");
            assert_eq!(
                keys,
                vec![
                    FeatureKey::new("FlexText/en", "gls"),
                    FeatureKey::new("FlexText/en", "txt"),
                    FeatureKey::new("FlexText/fr", "gls"),
                ]
            );
        }
    }
}

#[test]
fn database_file_persists_units() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("store").join("units.db");
    {
        let mut file_db = Database::open(path.clone()).expect("Failed to open database");
        file_db.migrate().expect("Failed to run migrations");
        file_db.set_type("w1", "word").expect("Failed to set type");
    }

    let reopened = Database::open(path).expect("Failed to reopen database");
    reopened.migrate().expect("Failed to run migrations");
    assert_eq!(reopened.count_units().expect("Query failed"), 1);
}
