use plantsync_core::db::open_db_in_memory;
use plantsync_core::model::component::{ConnectionType, ScreenPoint};
use plantsync_core::model::layout::{LayoutElement, Scale};
use plantsync_core::model::object::{ObjectData, PlantObject};
use plantsync_core::model::property::{keys, Color};
use plantsync_core::pool::PoolResult;
use plantsync_core::{
    ChangeKind, ChangeNotifier, CoreConfig, CourseModel, CourseSession, EntityKind, Figure,
    ModelFileStore, ObjectPool, ObjectRef, PoolError, SqliteObjectPool, SyncError,
    VisualComponent,
};

/// Read-only pool over a fixed object list; accepts states the SQLite pool
/// would refuse.
struct FixturePool {
    name: String,
    objects: Vec<PlantObject>,
}

impl ObjectPool for FixturePool {
    fn model_name(&self) -> PoolResult<String> {
        Ok(self.name.clone())
    }

    fn set_model_name(&self, _name: &str) -> PoolResult<()> {
        Err(PoolError::InvalidData("fixture pool is read-only".into()))
    }

    fn objects(&self, kind: EntityKind) -> PoolResult<Vec<PlantObject>> {
        Ok(self
            .objects
            .iter()
            .filter(|object| object.kind() == kind)
            .cloned()
            .collect())
    }

    fn object(&self, reference: &ObjectRef) -> PoolResult<Option<PlantObject>> {
        Ok(self
            .objects
            .iter()
            .find(|object| &object.reference() == reference)
            .cloned())
    }

    fn create_object(&self, object: &PlantObject) -> PoolResult<ObjectRef> {
        Err(PoolError::rejected(&object.reference(), "read-only"))
    }

    fn update_object(&self, object: &PlantObject) -> PoolResult<()> {
        Err(PoolError::rejected(&object.reference(), "read-only"))
    }

    fn withdraw_object(&self, reference: &ObjectRef) -> PoolResult<()> {
        Err(PoolError::rejected(reference, "read-only"))
    }

    fn set_property(&self, reference: &ObjectRef, _key: &str, _value: &str) -> PoolResult<()> {
        Err(PoolError::rejected(reference, "read-only"))
    }

    fn clear_properties(&self, reference: &ObjectRef) -> PoolResult<()> {
        Err(PoolError::rejected(reference, "read-only"))
    }
}

fn two_point_pool(pool: &SqliteObjectPool<'_>) {
    pool.create_object(&PlantObject::point("P1", 1000, 2000))
        .unwrap();
    pool.create_object(&PlantObject::point("P2", 3000, 2000))
        .unwrap();
    pool.create_object(&PlantObject::path("P1--P2", "P1", "P2"))
        .unwrap();
}

fn layout(elements: Vec<LayoutElement>) -> PlantObject {
    PlantObject::new(
        "VLayout",
        ObjectData::VisualLayout {
            scale_x: 1.0,
            scale_y: 1.0,
            elements,
        },
    )
}

#[test]
fn restore_without_layout_uses_default_scale_and_label_offsets() {
    let conn = open_db_in_memory().unwrap();
    let pool = SqliteObjectPool::try_new(&conn).unwrap();
    two_point_pool(&pool);

    let mut session = CourseSession::empty(&CoreConfig::default());
    session.restore_from_pool(&pool).unwrap();

    let model = session.model();
    assert_eq!(model.name(), "unnamed");
    assert_eq!(model.count_of(EntityKind::Path), 1);
    assert_eq!(model.count_of(EntityKind::VisualLayout), 1);
    assert_eq!(session.scale(), Scale::default());

    let first = session.registry().resolve(&ObjectRef::point("P1")).unwrap();
    let second = session.registry().resolve(&ObjectRef::point("P2")).unwrap();
    let path = session
        .component(&ObjectRef::path("P1--P2"))
        .unwrap();
    assert_eq!(path.figure.as_ref().unwrap().endpoints(), Some((first, second)));

    assert_eq!(
        model.get(first).unwrap().figure,
        Some(Figure::Node {
            position: ScreenPoint::new(1000.0, -2000.0),
            label_offset: ScreenPoint::new(-20.0, -20.0),
        })
    );
    assert!(session
        .registry()
        .find(&ObjectRef::point("P1"))
        .unwrap()
        .is_bound());
}

#[test]
fn layout_overrides_win_over_object_positions() {
    let conn = open_db_in_memory().unwrap();
    let pool = SqliteObjectPool::try_new(&conn).unwrap();
    pool.create_object(&PlantObject::new(
        "VLayout",
        ObjectData::VisualLayout {
            scale_x: 50.0,
            scale_y: 25.0,
            elements: vec![LayoutElement::new(ObjectRef::point("P1"))
                .with_property(keys::POINT_POS_X, "1000")
                .with_property(keys::POINT_POS_Y, "500")
                .with_property(keys::POINT_LABEL_OFFSET_X, "oops")],
        },
    ))
    .unwrap();
    pool.create_object(&PlantObject::point("P1", 9000, 9000))
        .unwrap();

    let mut session = CourseSession::empty(&CoreConfig::default());
    session.restore_from_pool(&pool).unwrap();

    assert_eq!(session.scale(), Scale::new(50.0, 25.0).unwrap());
    let point = session.component(&ObjectRef::point("P1")).unwrap();
    assert_eq!(
        point.figure,
        Some(Figure::Node {
            position: ScreenPoint::new(20.0, -20.0),
            label_offset: ScreenPoint::new(-20.0, -20.0),
        })
    );
}

#[test]
fn blocks_with_members_take_palette_colors_in_order() {
    let conn = open_db_in_memory().unwrap();
    let pool = SqliteObjectPool::try_new(&conn).unwrap();
    two_point_pool(&pool);
    let members = vec![ObjectRef::point("P1"), ObjectRef::point("P2")];
    pool.create_object(&PlantObject::block("B0", Vec::new()))
        .unwrap();
    pool.create_object(&PlantObject::block("B1", members.clone()))
        .unwrap();
    pool.create_object(&PlantObject::block("B2", members))
        .unwrap();

    let config = CoreConfig::default()
        .with_palette(["#112233", "#445566"])
        .unwrap();
    let mut session = CourseSession::empty(&config);
    session.restore_from_pool(&pool).unwrap();

    let color_of = |name: &str| {
        session
            .component(&ObjectRef::new(EntityKind::Block, name))
            .unwrap()
            .properties
            .color(keys::BLOCK_COLOR)
    };
    assert_eq!(color_of("B0"), None);
    assert_eq!(color_of("B1"), Color::parse_hex("#112233"));
    assert_eq!(color_of("B2"), Color::parse_hex("#445566"));

    let block = session
        .component(&ObjectRef::new(EntityKind::Block, "B1"))
        .unwrap();
    assert_eq!(block.members.len(), 2);
}

#[test]
fn layout_block_color_overrides_palette_for_that_block_only() {
    let conn = open_db_in_memory().unwrap();
    let pool = SqliteObjectPool::try_new(&conn).unwrap();
    pool.create_object(&layout(vec![LayoutElement::new(ObjectRef::new(
        EntityKind::Block,
        "B1",
    ))
    .with_property(keys::BLOCK_COLOR, "#FF0000")]))
        .unwrap();
    two_point_pool(&pool);
    let members = vec![ObjectRef::point("P1")];
    pool.create_object(&PlantObject::block("B1", members.clone()))
        .unwrap();
    pool.create_object(&PlantObject::block("B2", members))
        .unwrap();

    let config = CoreConfig::default()
        .with_palette(["#112233", "#445566"])
        .unwrap();
    let mut session = CourseSession::empty(&config);
    session.restore_from_pool(&pool).unwrap();

    let color_of = |name: &str| {
        session
            .component(&ObjectRef::new(EntityKind::Block, name))
            .unwrap()
            .properties
            .color(keys::BLOCK_COLOR)
    };
    assert_eq!(color_of("B1"), Some(Color::rgb(255, 0, 0)));
    assert_eq!(color_of("B2"), Color::parse_hex("#445566"));
}

#[test]
fn dangling_path_endpoint_fails_and_keeps_previous_session() {
    let pool = FixturePool {
        name: "broken".into(),
        objects: vec![
            PlantObject::point("P1", 0, 0),
            PlantObject::path("P1--P9", "P1", "P9"),
        ],
    };

    let mut session = CourseSession::empty(&CoreConfig::default());
    let err = session.restore_from_pool(&pool).unwrap_err();

    match err {
        SyncError::UnresolvedReference { owner, target } => {
            assert_eq!(owner, ObjectRef::path("P1--P9"));
            assert_eq!(target, ObjectRef::point("P9"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.model().name(), "unnamed");
    assert_eq!(session.model().len(), 1);
}

fn location(name: &str) -> PlantObject {
    PlantObject::new(
        name,
        ObjectData::Location {
            location_type: "LT1".into(),
            position: Default::default(),
        },
    )
}

fn link(name: &str, point: &str, location: &str) -> PlantObject {
    PlantObject::new(
        name,
        ObjectData::Link {
            point: point.into(),
            location: location.into(),
            allowed_operations: Vec::new(),
        },
    )
}

fn unresolved_target(err: SyncError) -> (ObjectRef, ObjectRef) {
    match err {
        SyncError::UnresolvedReference { owner, target } => (owner, target),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn link_with_missing_point_or_location_fails() {
    let missing_point = FixturePool {
        name: "yard".into(),
        objects: vec![location("L1"), link("P9--L1", "P9", "L1")],
    };
    let mut session = CourseSession::empty(&CoreConfig::default());
    let (owner, target) = unresolved_target(session.restore_from_pool(&missing_point).unwrap_err());
    assert_eq!(owner, ObjectRef::new(EntityKind::Link, "P9--L1"));
    assert_eq!(target, ObjectRef::point("P9"));

    let missing_location = FixturePool {
        name: "yard".into(),
        objects: vec![PlantObject::point("P1", 0, 0), link("P1--L9", "P1", "L9")],
    };
    let (owner, target) =
        unresolved_target(session.restore_from_pool(&missing_location).unwrap_err());
    assert_eq!(owner, ObjectRef::new(EntityKind::Link, "P1--L9"));
    assert_eq!(target, ObjectRef::location("L9"));
    assert_eq!(session.model().name(), "unnamed");
}

#[test]
fn routes_cycle_the_palette_independently_of_blocks() {
    let route = |name: &str, hops: &[&str]| {
        PlantObject::new(
            name,
            ObjectData::StaticRoute {
                hops: hops.iter().map(|hop| hop.to_string()).collect(),
            },
        )
    };
    let members = vec![ObjectRef::point("P1")];
    let pool = FixturePool {
        name: "yard".into(),
        objects: vec![
            PlantObject::point("P1", 0, 0),
            PlantObject::block("B1", members.clone()),
            PlantObject::block("B2", members),
            route("R1", &["P1"]),
            route("R2", &[]),
            route("R3", &["P1", "P1"]),
        ],
    };

    let config = CoreConfig::default()
        .with_palette(["#112233", "#445566"])
        .unwrap();
    let mut session = CourseSession::empty(&config);
    session.restore_from_pool(&pool).unwrap();

    let color_of = |kind: EntityKind, name: &str| {
        session
            .component(&ObjectRef::new(kind, name))
            .unwrap()
            .properties
            .color(keys::BLOCK_COLOR)
    };
    assert_eq!(color_of(EntityKind::Block, "B1"), Color::parse_hex("#112233"));
    assert_eq!(color_of(EntityKind::Block, "B2"), Color::parse_hex("#445566"));
    assert_eq!(color_of(EntityKind::StaticRoute, "R1"), Color::parse_hex("#112233"));
    assert_eq!(color_of(EntityKind::StaticRoute, "R2"), None);
    assert_eq!(color_of(EntityKind::StaticRoute, "R3"), Color::parse_hex("#445566"));
}

#[test]
fn stored_model_with_dangling_endpoints_fails_file_restore() {
    let home = tempfile::tempdir().unwrap();
    let store = ModelFileStore::new(home.path()).unwrap();

    let mut connection = VisualComponent::new(EntityKind::Path, "P1--P9");
    connection.properties.set_text(keys::START_COMPONENT, "P1");
    connection.properties.set_text(keys::END_COMPONENT, "P9");
    let mut model = CourseModel::new("stored");
    model.add(VisualComponent::new(EntityKind::Point, "P1"));
    model.add(connection);
    store.save(&model, None).unwrap();

    let mut session = CourseSession::empty(&CoreConfig::default());
    let (owner, target) = unresolved_target(session.restore_from_file(&store).unwrap_err());
    assert_eq!(owner, ObjectRef::path("P1--P9"));
    assert_eq!(target, ObjectRef::point("P9"));

    let mut dangling_link = VisualComponent::new(EntityKind::Link, "P1--L9");
    dangling_link.properties.set_text(keys::START_COMPONENT, "P1");
    dangling_link.properties.set_text(keys::END_COMPONENT, "L9");
    let mut model = CourseModel::new("stored");
    model.add(VisualComponent::new(EntityKind::Point, "P1"));
    model.add(dangling_link);
    store.save(&model, None).unwrap();

    let (owner, target) = unresolved_target(session.restore_from_file(&store).unwrap_err());
    assert_eq!(owner, ObjectRef::new(EntityKind::Link, "P1--L9"));
    assert_eq!(target, ObjectRef::location("L9"));
    assert_eq!(session.model().name(), "unnamed");
    assert_eq!(session.model().len(), 1);
}

#[test]
fn bezier_control_point_overrides_reach_connection_figures() {
    let bezier = |name: &str, control_points: &str| {
        LayoutElement::new(ObjectRef::path(name))
            .with_property(keys::PATH_CONN_TYPE, "bezier")
            .with_property(keys::PATH_CONTROL_POINTS, control_points)
    };
    let pool = FixturePool {
        name: "yard".into(),
        objects: vec![
            layout(vec![
                bezier("P1--P2", "10,20"),
                bezier("P2--P1", "10,20;30,40"),
            ]),
            PlantObject::point("P1", 0, 0),
            PlantObject::point("P2", 1000, 0),
            PlantObject::path("P1--P2", "P1", "P2"),
            PlantObject::path("P2--P1", "P2", "P1"),
        ],
    };

    let mut session = CourseSession::empty(&CoreConfig::default());
    session.restore_from_pool(&pool).unwrap();

    let figure_of = |name: &str| {
        session
            .component(&ObjectRef::path(name))
            .unwrap()
            .figure
            .clone()
            .unwrap()
    };
    let Figure::Connection {
        connection_type,
        control_points,
        ..
    } = figure_of("P1--P2")
    else {
        panic!("expected connection figure");
    };
    assert_eq!(connection_type, ConnectionType::Bezier);
    assert_eq!(
        control_points,
        vec![ScreenPoint::new(10.0, 20.0), ScreenPoint::new(10.0, 20.0)]
    );

    let Figure::Connection {
        connection_type,
        control_points,
        ..
    } = figure_of("P2--P1")
    else {
        panic!("expected connection figure");
    };
    assert_eq!(connection_type, ConnectionType::Bezier);
    assert_eq!(
        control_points,
        vec![ScreenPoint::new(10.0, 20.0), ScreenPoint::new(30.0, 40.0)]
    );
}

#[test]
fn unresolved_members_are_skipped() {
    let pool = FixturePool {
        name: "yard".into(),
        objects: vec![
            PlantObject::point("P1", 0, 0),
            PlantObject::block("B1", vec![ObjectRef::point("P1"), ObjectRef::point("P9")]),
            PlantObject::new(
                "R1",
                ObjectData::StaticRoute {
                    hops: vec!["P1".into(), "P9".into()],
                },
            ),
        ],
    };

    let mut session = CourseSession::empty(&CoreConfig::default());
    session.restore_from_pool(&pool).unwrap();

    let p1 = session.registry().resolve(&ObjectRef::point("P1")).unwrap();
    let block = session
        .component(&ObjectRef::new(EntityKind::Block, "B1"))
        .unwrap();
    assert_eq!(block.members, vec![p1]);
    let route = session
        .component(&ObjectRef::new(EntityKind::StaticRoute, "R1"))
        .unwrap();
    assert_eq!(route.members, vec![p1]);
    assert_eq!(session.model().name(), "yard");
}

#[test]
fn restore_publishes_one_event_per_component() {
    let conn = open_db_in_memory().unwrap();
    let pool = SqliteObjectPool::try_new(&conn).unwrap();
    two_point_pool(&pool);

    let (notifier, receiver) = ChangeNotifier::channel();
    let mut session = CourseSession::empty(&CoreConfig::default()).with_notifier(notifier);
    session.restore_from_pool(&pool).unwrap();

    let events: Vec<_> = receiver.try_iter().collect();
    assert_eq!(events.len(), session.model().len());
    assert!(events.iter().all(|event| event.kind == ChangeKind::Restored));
}
