use std::sync::Arc;

#[path = "common.rs"]
mod common;

use common::{class_list, engine};
use rosterdb::{Element, ScheduleError, StoreTransaction};

#[tokio::test]
async fn initialize_then_list_returns_classes_in_order() {
    let eng = engine().await;
    let t = eng.transactor();

    let offering = class_list(&["calc 101 2:00", "art 101 9:00", "bio lab 3:00"]);
    eng.scheduler.init(&t, &offering, 5).await.unwrap();

    let listed = eng.scheduler.list_classes(&t).await.unwrap();
    assert_eq!(listed, class_list(&["art 101 9:00", "bio lab 3:00", "calc 101 2:00"]));

    for class in &listed {
        assert_eq!(eng.scheduler.seats_remaining(&t, class).await.unwrap(), 5);
    }
}

#[tokio::test]
async fn listing_before_initialize_is_empty() {
    let eng = engine().await;
    let t = eng.transactor();
    assert!(eng.scheduler.list_classes(&t).await.unwrap().is_empty());
}

#[tokio::test]
async fn signup_is_idempotent() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["chem 201 4:00"]), 3)
        .await
        .unwrap();

    eng.scheduler.signup(&t, "s-1", "chem 201 4:00").await.unwrap();
    eng.scheduler.signup(&t, "s-1", "chem 201 4:00").await.unwrap();

    assert_eq!(
        eng.scheduler.seats_remaining(&t, "chem 201 4:00").await.unwrap(),
        2
    );
    assert_eq!(
        eng.scheduler.enrolled_classes(&t, "s-1").await.unwrap(),
        class_list(&["chem 201 4:00"])
    );
}

#[tokio::test]
async fn signup_then_drop_restores_seats() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["alg 301 5:00"]), 4)
        .await
        .unwrap();

    eng.scheduler.signup(&t, "s-7", "alg 301 5:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "alg 301 5:00").await.unwrap(), 3);

    eng.scheduler.drop_class(&t, "s-7", "alg 301 5:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "alg 301 5:00").await.unwrap(), 4);
    assert!(eng.scheduler.enrolled_classes(&t, "s-7").await.unwrap().is_empty());
}

#[tokio::test]
async fn dropping_while_not_enrolled_changes_nothing() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["film seminar 19:00"]), 2)
        .await
        .unwrap();

    eng.scheduler
        .drop_class(&t, "s-9", "film seminar 19:00")
        .await
        .unwrap();
    assert_eq!(
        eng.scheduler
            .seats_remaining(&t, "film seminar 19:00")
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn last_seat_is_never_oversold() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["art 101 9:00"]), 2)
        .await
        .unwrap();

    eng.scheduler.signup(&t, "s-1", "art 101 9:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "art 101 9:00").await.unwrap(), 1);

    eng.scheduler.signup(&t, "s-2", "art 101 9:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "art 101 9:00").await.unwrap(), 0);

    let err = eng.scheduler.signup(&t, "s-3", "art 101 9:00").await.unwrap_err();
    assert!(matches!(err, ScheduleError::NoRemainingSeats(ref class) if class == "art 101 9:00"));
    assert_eq!(eng.scheduler.seats_remaining(&t, "art 101 9:00").await.unwrap(), 0);

    eng.scheduler.drop_class(&t, "s-1", "art 101 9:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "art 101 9:00").await.unwrap(), 1);

    eng.scheduler.signup(&t, "s-3", "art 101 9:00").await.unwrap();
    assert_eq!(eng.scheduler.seats_remaining(&t, "art 101 9:00").await.unwrap(), 0);
}

#[tokio::test]
async fn signup_for_unknown_class_fails() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["geometry 101 8:00"]), 1)
        .await
        .unwrap();

    let err = eng.scheduler.signup(&t, "s-1", "dance 101 8:00").await.unwrap_err();
    assert!(matches!(err, ScheduleError::ClassNotFound(ref class) if class == "dance 101 8:00"));
}

#[tokio::test]
async fn reinitialize_resets_the_whole_namespace() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["music intro 6:00"]), 2)
        .await
        .unwrap();
    eng.scheduler.signup(&t, "s-4", "music intro 6:00").await.unwrap();

    eng.scheduler
        .init(&t, &class_list(&["cs mastery 10:00"]), 8)
        .await
        .unwrap();

    assert_eq!(
        eng.scheduler.list_classes(&t).await.unwrap(),
        class_list(&["cs mastery 10:00"])
    );
    assert!(eng.scheduler.enrolled_classes(&t, "s-4").await.unwrap().is_empty());
    let err = eng
        .scheduler
        .seats_remaining(&t, "music intro 6:00")
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::ClassNotFound(_)));
}

#[tokio::test]
async fn drop_surfaces_missing_class_record() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["bio 201 7:00"]), 2)
        .await
        .unwrap();
    eng.scheduler.signup(&t, "s-5", "bio 201 7:00").await.unwrap();

    // Simulate a re-initialization racing this enrollment: the class record
    // vanishes while the attendance marker survives.
    let class_key = eng
        .scheduler
        .namespace()
        .sub("class")
        .pack(&[Element::from("bio 201 7:00")]);
    eng.db
        .transact(move |tx| {
            let class_key = class_key.clone();
            async move {
                tx.clear(&class_key).await?;
                Ok(())
            }
        })
        .await
        .unwrap();

    let err = eng.scheduler.drop_class(&t, "s-5", "bio 201 7:00").await.unwrap_err();
    assert!(matches!(err, ScheduleError::ClassNotFound(ref class) if class == "bio 201 7:00"));
}

#[tokio::test]
async fn foreign_keys_in_the_class_region_surface_as_malformed() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["alg 101 2:00"]), 1)
        .await
        .unwrap();

    // A key this codec never produced, planted inside the class region.
    let mut rogue = eng.scheduler.namespace().sub("class").prefix().to_vec();
    rogue.extend_from_slice(&[0x07, 0x07]);
    eng.db
        .transact(move |tx| {
            let rogue = rogue.clone();
            async move {
                tx.set(&rogue, b"").await?;
                Ok(())
            }
        })
        .await
        .unwrap();

    let err = eng.scheduler.list_classes(&t).await.unwrap_err();
    assert!(matches!(err, ScheduleError::MalformedKey(_)));
}

#[tokio::test]
async fn concurrent_signups_respect_capacity() {
    const SEATS: u32 = 3;
    const STUDENTS: usize = 8;

    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["calc mastery 14:00"]), SEATS)
        .await
        .unwrap();

    let scheduler = Arc::new(eng.scheduler.clone());
    let mut tasks = Vec::with_capacity(STUDENTS);
    for i in 0..STUDENTS {
        let scheduler = scheduler.clone();
        let t = eng.transactor();
        tasks.push(tokio::spawn(async move {
            let student = format!("s-{i}");
            scheduler.signup(&t, &student, "calc mastery 14:00").await
        }));
    }

    let mut admitted = 0;
    let mut turned_away = 0;
    for task in tasks {
        match task.await.expect("signup task panicked") {
            Ok(()) => admitted += 1,
            Err(ScheduleError::NoRemainingSeats(_)) => turned_away += 1,
            Err(other) => panic!("unexpected signup outcome: {other}"),
        }
    }

    assert_eq!(admitted, SEATS as usize);
    assert_eq!(turned_away, STUDENTS - SEATS as usize);
    assert_eq!(
        eng.scheduler
            .seats_remaining(&t, "calc mastery 14:00")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn switch_class_moves_enrollment_atomically() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["alg intro 2:00", "alg lab 3:00"]), 1)
        .await
        .unwrap();

    eng.scheduler.signup(&t, "s-1", "alg intro 2:00").await.unwrap();
    eng.scheduler
        .switch_class(&t, "s-1", "alg intro 2:00", "alg lab 3:00")
        .await
        .unwrap();

    assert_eq!(
        eng.scheduler.enrolled_classes(&t, "s-1").await.unwrap(),
        class_list(&["alg lab 3:00"])
    );
    assert_eq!(eng.scheduler.seats_remaining(&t, "alg intro 2:00").await.unwrap(), 1);
    assert_eq!(eng.scheduler.seats_remaining(&t, "alg lab 3:00").await.unwrap(), 0);
}

#[tokio::test]
async fn failed_switch_rolls_back_both_halves() {
    let eng = engine().await;
    let t = eng.transactor();
    eng.scheduler
        .init(&t, &class_list(&["chem intro 2:00", "chem lab 3:00"]), 1)
        .await
        .unwrap();

    // Fill the destination before the switch.
    eng.scheduler.signup(&t, "s-2", "chem lab 3:00").await.unwrap();
    eng.scheduler.signup(&t, "s-1", "chem intro 2:00").await.unwrap();

    let err = eng
        .scheduler
        .switch_class(&t, "s-1", "chem intro 2:00", "chem lab 3:00")
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::NoRemainingSeats(_)));

    // The drop half must not have leaked out of the aborted transaction.
    assert_eq!(
        eng.scheduler.enrolled_classes(&t, "s-1").await.unwrap(),
        class_list(&["chem intro 2:00"])
    );
    assert_eq!(eng.scheduler.seats_remaining(&t, "chem intro 2:00").await.unwrap(), 0);
    assert_eq!(
        eng.scheduler.enrolled_classes(&t, "s-2").await.unwrap(),
        class_list(&["chem lab 3:00"])
    );
}
