use std::sync::Arc;

use chrono::NaiveDate;
use grow_spaces::{
    AuthSession, Collection, GrowError, GrowSpaceManager, LightCycle, MemoryStore, NewGrowSpace, NoteDate,
    NotesManager, Plant, PlantType, RecordStore, Stage, User,
};

fn session_for(uid: &str) -> Arc<AuthSession> {
    let session = Arc::new(AuthSession::new(None));
    session.apply_auth_event(Some(User::new(uid)));
    session
}

fn tent_a() -> NewGrowSpace {
    NewGrowSpace {
        name: "Tent A".to_string(),
        power: Some(600),
        light_cycle: Some("18/6".parse::<LightCycle>().unwrap()),
        stage: Some("veg".parse::<Stage>().unwrap()),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_edit_delete_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let mut grow = GrowSpaceManager::new(store.clone(), session_for("u1"));

    let id = grow.create(tent_a()).await.unwrap().id.clone();
    assert_eq!(grow.spaces().len(), 1);
    assert!(grow.spaces()[0].plants.is_empty());

    let plant = Plant::new("OG Kush", PlantType::Clone, "5gal");
    grow.begin_edit(&id).unwrap();
    grow.add_plant_to_scratch(plant.clone()).unwrap();
    grow.commit_edit(&id).await.unwrap();

    let persisted = grow.fetch(&id).await.unwrap();
    assert_eq!(persisted.plants, vec![plant]);

    grow.delete(&id).await.unwrap();
    assert!(grow.spaces().is_empty());
    assert!(store.get(&Collection::GrowSpaces, &id).await.unwrap().is_none());
    match grow.fetch(&id).await {
        Err(GrowError::Store(e)) => assert!(e.is_not_found()),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn load_for_user_returns_only_their_spaces() {
    let store = Arc::new(MemoryStore::new());

    let mut first = GrowSpaceManager::new(store.clone(), session_for("u1"));
    first.create(tent_a()).await.unwrap();
    let mut second = GrowSpaceManager::new(store.clone(), session_for("u2"));
    second.create(tent_a()).await.unwrap();
    second.create(tent_a()).await.unwrap();

    let mut fresh = GrowSpaceManager::new(store.clone(), session_for("u1"));
    let spaces = fresh.load_for_user("u1").await.unwrap();
    assert_eq!(spaces.len(), 1);
    assert!(spaces.iter().all(|space| space.owner_id == "u1"));
}

#[tokio::test]
async fn notes_follow_their_grow_space() {
    let store = Arc::new(MemoryStore::new());
    let mut grow = GrowSpaceManager::new(store.clone(), session_for("u1"));
    let id = grow.create(tent_a()).await.unwrap().id.clone();

    let date = NoteDate::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    let mut notes = NotesManager::new(store.clone());
    notes.load_notes(&id).await.unwrap();
    notes.save_note(date, "x").await.unwrap();

    let mut reloaded = NotesManager::new(store.clone());
    let mapping = reloaded.load_notes(&id).await.unwrap();
    assert_eq!(mapping.get(&date).map(String::as_str), Some("x"));

    reloaded.delete_note(date).await.unwrap();
    assert!(!reloaded.has_note(date));
    reloaded.delete_note(date).await.unwrap();
    assert!(reloaded.load_notes(&id).await.unwrap().is_empty());
}
