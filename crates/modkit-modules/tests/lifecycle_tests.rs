//! Module lifecycle integration tests
//!
//! Drives the module manager over a real temporary project:
//! - Install, update and uninstall through the queue
//! - Prerequisite ordering and enforcement
//! - Resuming after a simulated process restart

mod common;

use common::*;
use modkit_core::types::{ChangeRequest, ModuleStatus, UNKNOWN_REVISION};
use modkit_modules::{AddOutcome, ChangeEvent};

#[test]
fn test_install_end_to_end() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);

    assert!(!manager.is_installed(&m));
    assert_eq!(manager.installed_revision(&m), UNKNOWN_REVISION);
    assert_eq!(manager.status_icon(&m), ModuleStatus::NotInstalled);
    assert!(manager.has_package(&m));

    let outcome = manager
        .add_to_queue(ChangeRequest::install(m.package_file_path.clone()))
        .unwrap();
    assert_eq!(outcome, AddOutcome::Added);
    assert_eq!(manager.queue_state().unwrap().entries.len(), 1);

    assert!(manager.try_process_next().unwrap());

    assert!(manager.is_installed(&m));
    assert_eq!(manager.installed_revision(&m), 3);
    assert!(!manager.has_update(&m));
    assert_eq!(manager.status_icon(&m), ModuleStatus::Installed);
    assert_eq!(fixture.symbol_file_content(), "-define:FEATURE_M\n");
    assert!(fixture
        .install_dir("feature_m")
        .join("src/feature.txt")
        .exists());

    assert!(!manager.try_process_next().unwrap());
    assert!(manager.current_process().is_none());
}

#[test]
fn test_state_survives_new_manager() {
    let fixture = ProjectFixture::new();
    {
        let manager = fixture.manager();
        let m = fixture.module(&manager, FEATURE_M_NS);
        manager.enqueue_install(&m, true).unwrap();
        manager.run_queue().unwrap();
    }

    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    assert!(manager.is_installed(&m));
    assert_eq!(manager.installed_revision(&m), 3);
    assert!(manager.has_define(&m));
}

#[test]
fn test_update_available_then_applied() {
    let fixture = ProjectFixture::new();
    {
        let manager = fixture.manager();
        let m = fixture.module(&manager, FEATURE_M_NS);
        manager.enqueue_install(&m, true).unwrap();
        manager.run_queue().unwrap();
    }

    fixture.write_manifest(&[(CORE_NS, 1), (CURRENCY_NS, 2), (FEATURE_M_NS, 4)]);
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    assert!(manager.has_update(&m));
    assert_eq!(manager.status_icon(&m), ModuleStatus::UpdateAvailable);

    manager.enqueue_update(&m).unwrap();
    assert_eq!(manager.run_queue().unwrap(), 1);

    assert_eq!(manager.installed_revision(&m), 4);
    assert!(!manager.has_update(&m));
    assert_eq!(fixture.symbol_file_content(), "-define:FEATURE_M\n");
}

#[test]
fn test_uninstall_removes_everything() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    manager.enqueue_install(&m, true).unwrap();
    manager.run_queue().unwrap();

    manager.enqueue_uninstall(&m).unwrap();
    assert_eq!(manager.run_queue().unwrap(), 1);

    assert!(!manager.is_installed(&m));
    assert_eq!(manager.installed_revision(&m), UNKNOWN_REVISION);
    assert!(!fixture.install_dir("feature_m").exists());
    assert_eq!(fixture.symbol_file_content(), "");
    assert!(manager.tracker().installed_record(FEATURE_M_NS).is_none());
}

#[test]
fn test_prerequisites_installed_first() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let currency = fixture.module(&manager, CURRENCY_NS);
    let core = fixture.module(&manager, CORE_NS);

    let added = manager.enqueue_install(&currency, true).unwrap();
    assert_eq!(
        added,
        vec![
            ChangeRequest::install(core.package_file_path.clone()),
            ChangeRequest::install(currency.package_file_path.clone()),
        ]
    );

    assert_eq!(manager.run_queue().unwrap(), 2);
    assert!(manager.is_installed(&core));
    assert!(manager.is_installed(&currency));
    assert_eq!(manager.installed_revision(&currency), 2);
    assert!(fixture.install_dir("currency").join("rates/eur.txt").exists());
    assert_eq!(
        fixture.symbol_file_content(),
        "-define:MODKIT_CORE\n-define:MODKIT_CURRENCY\n"
    );
}

#[test]
fn test_install_without_prerequisites_fails_and_keeps_queue() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let currency = fixture.module(&manager, CURRENCY_NS);

    manager.enqueue_install(&currency, false).unwrap();
    let before = manager.queue_state().unwrap();

    let err = manager.try_process_next().unwrap_err();
    assert!(format!("{:#}", err).contains(CORE_NS));
    assert_eq!(manager.queue_state().unwrap(), before);
    assert!(!manager.is_installed(&currency));
    assert_eq!(fixture.symbol_file_content(), "");

    let history = manager
        .journal()
        .unwrap()
        .history(CURRENCY_NS, None)
        .unwrap();
    assert_eq!(history.last().unwrap().event, ChangeEvent::Failed);
}

#[test]
fn test_missing_package_fails() {
    let fixture = ProjectFixture::new();
    std::fs::remove_dir_all(fixture.root().join("packages/feature_m")).unwrap();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    assert!(!manager.has_package(&m));

    manager.enqueue_install(&m, true).unwrap();
    let err = manager.try_process_next().unwrap_err();
    assert!(format!("{:#}", err).contains("not found"));
}

#[test]
fn test_resume_after_restart() {
    let fixture = ProjectFixture::new();
    let first = {
        let manager = fixture.manager();
        let m = fixture.module(&manager, FEATURE_M_NS);
        let core = fixture.module(&manager, CORE_NS);
        manager.enqueue_install(&m, true).unwrap();
        manager.enqueue_install(&core, true).unwrap();

        assert!(manager.try_process_next().unwrap());
        manager.current_process().unwrap()
    };

    // a new process sees the same current change
    let manager = fixture.manager();
    assert_eq!(manager.current_process().unwrap(), first);

    // re-running the interrupted change converges
    assert!(manager.resume().unwrap());
    assert_eq!(fixture.symbol_file_content(), "-define:FEATURE_M\n");

    assert!(manager.try_process_next().unwrap());
    assert!(!manager.try_process_next().unwrap());
    assert_eq!(
        fixture.symbol_file_content(),
        "-define:FEATURE_M\n-define:MODKIT_CORE\n"
    );
    assert!(!manager.resume().unwrap());
}

#[test]
fn test_duplicate_submissions_dropped() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);

    manager.enqueue_install(&m, true).unwrap();
    assert!(manager.enqueue_install(&m, true).unwrap().is_empty());
    assert_eq!(
        manager.enqueue_update(&m).unwrap(),
        AddOutcome::Added
    );
    assert_eq!(manager.queue_state().unwrap().entries.len(), 2);
}

#[test]
fn test_journal_records_lifecycle() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    manager.enqueue_install(&m, true).unwrap();
    manager.run_queue().unwrap();

    let events: Vec<ChangeEvent> = manager
        .journal()
        .unwrap()
        .history(FEATURE_M_NS, None)
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(
        events,
        vec![ChangeEvent::Queued, ChangeEvent::Started, ChangeEvent::Completed]
    );
    assert!(fixture.root().join("state/journal.jsonl").exists());
}

#[test]
fn test_broken_update_keeps_previous_install() {
    let fixture = ProjectFixture::new();
    {
        let manager = fixture.manager();
        let currency = fixture.module(&manager, CURRENCY_NS);
        manager.enqueue_install(&currency, true).unwrap();
        manager.run_queue().unwrap();
    }
    let symbols_before = fixture.symbol_file_content();

    std::fs::write(fixture.root().join("packages/currency.tar.gz"), "not a tarball").unwrap();
    fixture.write_manifest(&[(CORE_NS, 1), (CURRENCY_NS, 9), (FEATURE_M_NS, 3)]);
    {
        let manager = fixture.manager();
        let currency = fixture.module(&manager, CURRENCY_NS);
        assert!(manager.has_update(&currency));
        manager.enqueue_update(&currency).unwrap();
        let err = manager.run_queue().unwrap_err();
        assert!(format!("{:#}", err).contains("extract"));
    }

    let manager = fixture.manager();
    let currency = fixture.module(&manager, CURRENCY_NS);
    assert!(manager.is_installed(&currency));
    assert_eq!(manager.installed_revision(&currency), 2);
    assert!(manager.has_update(&currency));
    assert!(manager.has_define(&currency));
    assert_eq!(
        manager
            .tracker()
            .installed_record(CURRENCY_NS)
            .map(|r| r.revision),
        Some(2)
    );
    assert!(fixture.install_dir("currency").join("rates/eur.txt").exists());
    assert!(fixture
        .install_dir("currency")
        .join(DESCRIPTOR_FILE_NAME)
        .exists());
    assert_eq!(fixture.symbol_file_content(), symbols_before);

    let mut installed: Vec<String> = std::fs::read_dir(fixture.root().join("modules"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    installed.sort();
    assert_eq!(installed, vec!["core", "currency"]);

    assert_eq!(
        manager.current_process(),
        Some(ChangeRequest::update(currency.package_file_path.clone()))
    );
}

#[test]
fn test_failed_change_stays_current_after_earlier_success() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);
    let currency = fixture.module(&manager, CURRENCY_NS);

    manager.enqueue_install(&m, true).unwrap();
    manager.enqueue_install(&currency, false).unwrap();
    assert!(manager.run_queue().is_err());

    assert!(manager.is_installed(&m));
    assert_eq!(
        manager.current_process(),
        Some(ChangeRequest::install(currency.package_file_path.clone()))
    );

    let journal = manager.journal().unwrap();
    let feature_events = journal.history(FEATURE_M_NS, None).unwrap().len();
    assert!(!manager.resume().unwrap());
    assert_eq!(
        journal.history(FEATURE_M_NS, None).unwrap().len(),
        feature_events
    );

    // the next step retries the failed install, not the finished one
    assert!(manager.try_process_next().is_err());
    assert_eq!(
        journal.history(FEATURE_M_NS, None).unwrap().len(),
        feature_events
    );
}

#[test]
fn test_reinstall_after_uninstall() {
    let fixture = ProjectFixture::new();
    let manager = fixture.manager();
    let m = fixture.module(&manager, FEATURE_M_NS);

    manager.enqueue_install(&m, true).unwrap();
    manager.run_queue().unwrap();
    manager.enqueue_uninstall(&m).unwrap();
    manager.run_queue().unwrap();
    assert!(!manager.is_installed(&m));

    assert_eq!(manager.enqueue_install(&m, true).unwrap().len(), 1);
    assert_eq!(manager.run_queue().unwrap(), 1);
    assert!(manager.is_installed(&m));
    assert_eq!(fixture.symbol_file_content(), "-define:FEATURE_M\n");
}
