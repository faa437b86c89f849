use super::*;

#[tokio::test]
async fn test_create_assigns_sequential_serials() {
    let manager = create_test_manager().await;

    let first = manager
        .create_employee(EmployeeCreate {
            name: "Ram Kumar".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(6),
            year: Some(2024),
            created_by: Some("admin".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(first.empid, "EMP001");
    assert!(first.attendance.is_empty());
    assert_eq!(first.closing_balance, 0.0);
    assert_eq!(first.created_by, "admin");

    let second = manager
        .create_employee(EmployeeCreate {
            name: "Shyam Lal".to_string(),
            site_id: "SITE1".to_string(),
            rate: 450.0,
            month: Some(6),
            year: Some(2024),
            created_by: None,
        })
        .await
        .unwrap();
    assert_eq!(second.empid, "EMP002");
    assert_eq!(second.created_by, "system");
}

#[tokio::test]
async fn test_create_continues_from_highest_serial() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP007", 6, 2024, 500.0, vec!["P"]).await;

    let created = manager
        .create_employee(EmployeeCreate {
            name: "New Worker".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(6),
            year: Some(2024),
            created_by: None,
        })
        .await
        .unwrap();
    assert_eq!(created.empid, "EMP008");
}

#[tokio::test]
async fn test_create_defaults_to_current_month() {
    let manager = create_test_manager().await;
    let (month, year) = time::current_month_year();

    let created = manager
        .create_employee(EmployeeCreate {
            name: "Default Month".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: None,
            year: None,
            created_by: None,
        })
        .await
        .unwrap();
    assert_eq!(created.month, month);
    assert_eq!(created.year, year);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let manager = create_test_manager().await;

    let err = manager
        .create_employee(EmployeeCreate {
            name: "   ".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(6),
            year: Some(2024),
            created_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = manager
        .create_employee(EmployeeCreate {
            name: "Zero Rate".to_string(),
            site_id: "SITE1".to_string(),
            rate: 0.0,
            month: Some(6),
            year: Some(2024),
            created_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = manager
        .create_employee(EmployeeCreate {
            name: "Bad Month".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(0),
            year: Some(2024),
            created_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_year_has_no_upper_bound() {
    let manager = create_test_manager().await;

    // Anything from 2000 on is a valid contract year
    let record = manager
        .create_employee(EmployeeCreate {
            name: "Long Contract".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(1),
            year: Some(2101),
            created_by: None,
        })
        .await
        .unwrap();
    assert_eq!(record.year, 2101);

    let err = manager
        .create_employee(EmployeeCreate {
            name: "Too Early".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(1),
            year: Some(1999),
            created_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_create_writes_lifecycle_entry() {
    let manager = create_test_manager().await;
    let created = manager
        .create_employee(EmployeeCreate {
            name: "Audited Worker".to_string(),
            site_id: "SITE1".to_string(),
            rate: 500.0,
            month: Some(6),
            year: Some(2024),
            created_by: Some("admin".to_string()),
        })
        .await
        .unwrap();

    let entries = ledger_entries_for(&manager, &created.empid).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field, ChangeField::Record);
    assert_eq!(entries[0].change_type, ChangeType::Added);
    assert!(entries[0].description.contains("EMP001"));
    assert_eq!(
        entries[0].data["record"]["empid"].as_str(),
        Some("EMP001")
    );
}

#[tokio::test]
async fn test_duplicate_month_insert_is_conflict() {
    let manager = create_test_manager().await;
    let seeded = seed_month(&manager, "EMP001", 6, 2024, 400.0, vec!["P"]).await;

    // Second insert for the same (empid, month, year) trips the unique
    // index and surfaces as Conflict, not a raw database error
    let err = AppError::from(repo::insert(&manager.pool, &seeded).await.unwrap_err());
    match err {
        AppError::Conflict(msg) => {
            assert!(msg.contains("EMP001"), "message: {msg}");
            assert!(msg.contains("6/2024"), "message: {msg}");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_month_snapshots_before_removal() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP002", 5, 2024, 500.0, vec!["P", "P"]).await;
    seed_month(&manager, "EMP002", 6, 2024, 500.0, vec!["P"]).await;

    manager
        .delete_month("EMP002", 5, 2024, "admin", Some("cleanup".to_string()))
        .await
        .unwrap();

    assert!(repo::find(&manager.pool, "EMP002", 5, 2024).await.unwrap().is_none());
    // Later months are left alone: not flagged, not recomputed
    let later = find_record(&manager, "EMP002", 6, 2024).await;
    assert!(!later.recalculation_needed);
    assert_eq!(later.closing_balance, 500.0);

    let entries = ledger_entries_for(&manager, "EMP002").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field, ChangeField::Record);
    assert_eq!(entries[0].change_type, ChangeType::Removed);
    assert_eq!(entries[0].month, 5);
    assert_eq!(entries[0].remark.as_deref(), Some("cleanup"));
    // Full pre-deletion state survives in the entry payload
    assert_eq!(entries[0].data["record"]["closing_balance"].as_f64(), Some(1000.0));
}

#[tokio::test]
async fn test_delete_month_missing_is_not_found() {
    let manager = create_test_manager().await;
    let err = manager
        .delete_month("EMP404", 6, 2024, "admin", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_aborts_when_ledger_write_fails() {
    let manager = create_manager_with_broken_ledger().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;

    let err = manager
        .delete_month("EMP001", 6, 2024, "admin", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    // No snapshot written means no record removed
    assert!(repo::find(&manager.pool, "EMP001", 6, 2024).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_employee_removes_all_months() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 4, 2024, 500.0, vec!["P"]).await;
    seed_month(&manager, "EMP001", 5, 2024, 500.0, vec!["P"]).await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;

    let removed = manager.delete_employee("EMP001", "admin", None).await.unwrap();
    assert_eq!(removed, 3);
    assert!(repo::find_all_months(&manager.pool, "EMP001").await.unwrap().is_empty());

    let entries = ledger_entries_for(&manager, "EMP001").await;
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.change_type == ChangeType::Removed));
    let mut months: Vec<u32> = entries.iter().map(|e| e.month).collect();
    months.sort_unstable();
    assert_eq!(months, vec![4, 5, 6]);
}

#[tokio::test]
async fn test_delete_employee_without_records_is_not_found() {
    let manager = create_test_manager().await;
    let err = manager.delete_employee("EMP404", "admin", None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_import_copies_identity_and_resets_activity() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P", "P", "P8"]).await;
    let patch = EmployeeMonthPatch {
        payouts: Some(vec![pay_item(400.0, "2024-06-10", "advance")]),
        additional_req_pays: Some(vec![pay_item(150.0, "2024-06-20", "bonus")]),
        ..Default::default()
    };
    manager
        .update_employee("EMP001", 6, 2024, patch, "admin", None)
        .await
        .unwrap();
    // 3 present + 1 overtime day at 500, +150 bonus, -400 advance
    assert_eq!(find_record(&manager, "EMP001", 6, 2024).await.closing_balance, 1750.0);

    let report = manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: None,
            preserve_carry_forward: true,
            preserve_additional_pays: false,
            changed_by: Some("importer".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(report.imported, 1);
    assert!(report.failures.is_empty());

    let july = find_record(&manager, "EMP001", 7, 2024).await;
    assert!(july.attendance.is_empty());
    assert!(july.payouts.is_empty());
    assert!(july.additional_req_pays.is_empty());
    assert_eq!(july.rate, 500.0);
    assert_eq!(july.name, "Worker EMP001");
    assert_eq!(july.created_by, "importer");
    assert_eq!(july.carry_forwarded.value, 1750.0);
    assert_eq!(july.closing_balance, 1750.0);
    assert_eq!(
        july.carry_forwarded.remark.as_deref(),
        Some("Carried forward from 6/2024")
    );
}

#[tokio::test]
async fn test_import_preserve_flags() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;
    let patch = EmployeeMonthPatch {
        additional_req_pays: Some(vec![pay_item(150.0, "2024-06-20", "bonus")]),
        ..Default::default()
    };
    manager
        .update_employee("EMP001", 6, 2024, patch, "admin", None)
        .await
        .unwrap();

    manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: None,
            preserve_carry_forward: false,
            preserve_additional_pays: true,
            changed_by: None,
        })
        .await
        .unwrap();

    let july = find_record(&manager, "EMP001", 7, 2024).await;
    assert_eq!(july.carry_forwarded.value, 0.0);
    assert_eq!(july.additional_req_pays.len(), 1);
    assert_eq!(july.closing_balance, 150.0);
}

#[tokio::test]
async fn test_import_conflict_rejects_whole_request() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;
    seed_month(&manager, "EMP002", 6, 2024, 450.0, vec!["P"]).await;
    seed_month(&manager, "EMP002", 7, 2024, 450.0, vec![]).await;

    let err = manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: None,
            preserve_carry_forward: true,
            preserve_additional_pays: false,
            changed_by: None,
        })
        .await
        .unwrap_err();

    match err {
        AppError::Conflict(msg) => assert!(msg.contains("EMP002")),
        other => panic!("expected conflict, got {other:?}"),
    }
    // Nothing was imported, not even the conflict-free employee
    assert!(repo::find(&manager.pool, "EMP001", 7, 2024).await.unwrap().is_none());
}

#[tokio::test]
async fn test_import_selected_employees_only() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;
    seed_month(&manager, "EMP002", 6, 2024, 450.0, vec!["P"]).await;

    let report = manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: Some(vec!["EMP002".to_string()]),
            preserve_carry_forward: true,
            preserve_additional_pays: false,
            changed_by: None,
        })
        .await
        .unwrap();

    assert_eq!(report.imported, 1);
    assert!(repo::find(&manager.pool, "EMP001", 7, 2024).await.unwrap().is_none());
    assert!(repo::find(&manager.pool, "EMP002", 7, 2024).await.unwrap().is_some());
}

#[tokio::test]
async fn test_import_empty_source_is_not_found() {
    let manager = create_test_manager().await;
    let err = manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: None,
            preserve_carry_forward: true,
            preserve_additional_pays: false,
            changed_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_list_employees_for_site_month() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP002", 6, 2024, 450.0, vec!["P"]).await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P"]).await;
    seed_month(&manager, "EMP001", 7, 2024, 500.0, vec!["P"]).await;

    let records = manager.list_employees("SITE1", 6, 2024).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].empid, "EMP001");
    assert_eq!(records[1].empid, "EMP002");
}

#[tokio::test]
async fn test_import_backfill_flags_later_months() {
    let manager = create_test_manager().await;
    seed_month(&manager, "EMP001", 6, 2024, 500.0, vec!["P", "P"]).await;
    seed_month(&manager, "EMP001", 8, 2024, 500.0, vec!["P"]).await;

    manager
        .import_between_months(ImportRequest {
            site_id: "SITE1".to_string(),
            source_month: 6,
            source_year: 2024,
            target_month: 7,
            target_year: 2024,
            employee_ids: None,
            preserve_carry_forward: true,
            preserve_additional_pays: false,
            changed_by: None,
        })
        .await
        .unwrap();

    // 8/2024 carried a balance that no longer matches its new predecessor
    assert!(find_record(&manager, "EMP001", 8, 2024).await.recalculation_needed);
}
