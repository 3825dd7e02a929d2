use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::core::{DisplayOptions, DisplayOptionsUpdate, Timestamp};
use crate::error::{PlayError, PlayResult};
use crate::events::{Event, EventBus, EventEmitting};
use crate::input::{EntityKey, FieldRef, IngestSpec, Parsers, Row};
use crate::overlay::{OverlayRegistry, Surface};
use crate::playback::store::{Entity, EntityStore, IngestSummary};
use crate::playback::tracker::refresh_entity;
use crate::playback::{EndOfDataPolicy, PlaybackMode, PlaybackState, PlaybackStatus};
use crate::settings::Settings;

/// Playback controller: owns the entities and the time cursor, and refreshes
/// every entity's overlay whenever time changes.
pub struct Player {
    mode: PlaybackMode,
    store: EntityStore,
    events: EventBus,
    registry: OverlayRegistry,
    surface: Surface,
    parsers: Parsers,
    current_time: Timestamp,
    /// False until time is set explicitly or by the first ingestion
    time_set: bool,
    end_of_data: EndOfDataPolicy,
    past_end: bool,
    default_display: DisplayOptions,
    timer_armed: bool,
}

impl Player {
    /// A timer-driven player, initially paused
    pub fn continuous(surface: Surface, registry: OverlayRegistry, settings: &Settings) -> Self {
        let mode = PlaybackMode::Continuous {
            state: PlaybackState::Paused,
            tick_increment: settings.tick_increment,
        };
        Self::new(mode, surface, registry, settings)
    }

    /// A player whose time only moves through [`Player::set_current_time`]
    pub fn discrete(surface: Surface, registry: OverlayRegistry, settings: &Settings) -> Self {
        Self::new(PlaybackMode::Discrete, surface, registry, settings)
    }

    fn new(mode: PlaybackMode, surface: Surface, registry: OverlayRegistry, settings: &Settings) -> Self {
        Self {
            mode,
            store: EntityStore::new(),
            events: EventBus::new(),
            registry,
            surface,
            parsers: Parsers::default(),
            current_time: Timestamp::default(),
            time_set: false,
            end_of_data: settings.end_of_data,
            past_end: false,
            default_display: settings.default_display.clone(),
            timer_armed: matches!(mode, PlaybackMode::Continuous { .. }),
        }
    }

    /// Swap the time and geometry parsers used by ingestion
    pub fn with_parsers(mut self, parsers: Parsers) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn state(&self) -> PlaybackState {
        match self.mode {
            PlaybackMode::Continuous { state, .. } => state,
            PlaybackMode::Discrete => PlaybackState::Paused,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            current_time: self.current_time,
            start_time: self.start_time(),
            stop_time: self.stop_time(),
            paused: self.state() == PlaybackState::Paused,
            tick_increment: self.timer_increment(),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    // Ingestion

    /// Rows that all belong to `entity_name`
    pub fn push_entity_data(
        &mut self,
        entity_name: &str,
        rows: &[Row],
        time_field: Option<FieldRef>,
        geometry_field: Option<FieldRef>,
        display: Option<DisplayOptions>,
    ) -> PlayResult<IngestSummary> {
        let key = EntityKey::Named(entity_name.to_string());
        self.ingest(build_spec(key, time_field, geometry_field, display), rows)
    }

    /// Rows naming their entity in `entity_field`, or all in the default entity when None
    pub fn push_data(
        &mut self,
        entity_field: Option<FieldRef>,
        rows: &[Row],
        time_field: Option<FieldRef>,
        geometry_field: Option<FieldRef>,
        display: Option<DisplayOptions>,
    ) -> PlayResult<IngestSummary> {
        let key = entity_field.map_or(EntityKey::Default, EntityKey::Column);
        self.ingest(build_spec(key, time_field, geometry_field, display), rows)
    }

    /// Ingest `rows`, refresh every entity at the current time, then emit `DataReady`.
    ///
    /// The first successful ingestion also moves time to the start of the data.
    /// On error nothing is emitted and the time range is left as it was.
    pub fn ingest(&mut self, mut spec: IngestSpec, rows: &[Row]) -> PlayResult<IngestSummary> {
        if spec.display.is_none() {
            spec.display = Some(self.default_display.clone());
        }
        let summary = self.store.ingest(&spec, rows, &self.parsers)?;

        match self.store.start_time() {
            Some(start) if !self.time_set => self.set_current_time(start),
            _ => self.refresh(),
        }
        self.events.emit(&Event::DataReady);
        Ok(summary)
    }

    // Time control

    /// Move the cursor, emit `TimeChanged`, refresh every entity and emit
    /// `EndOfData` if time is now past the stop time (subject to the policy).
    pub fn set_current_time(&mut self, time: Timestamp) {
        self.current_time = time;
        self.time_set = true;
        self.events.emit(&Event::TimeChanged(time));

        self.refresh();

        let was_past_end = self.past_end;
        self.past_end = self.store.stop_time().is_some_and(|stop| time > stop);
        let fire = match self.end_of_data {
            EndOfDataPolicy::EveryCall => self.past_end,
            EndOfDataPolicy::EdgeTriggered => self.past_end && !was_past_end,
        };
        if fire {
            debug!(%time, "end of data");
            self.events.emit(&Event::EndOfData);
        }
    }

    fn refresh(&mut self) {
        let time = self.current_time;
        // Snapshot the names; the map itself stays untouched during the pass
        for name in self.store.names() {
            if let Some(entity) = self.store.get_mut(&name) {
                refresh_entity(entity, time, &self.registry, &self.surface);
            }
        }
    }

    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    pub fn start_time(&self) -> Option<Timestamp> {
        self.store.start_time()
    }

    pub fn stop_time(&self) -> Option<Timestamp> {
        self.store.stop_time()
    }

    // Continuous mode

    pub fn play(&mut self) -> PlayResult<()> {
        self.set_state(PlaybackState::Playing)
    }

    pub fn pause(&mut self) -> PlayResult<()> {
        self.set_state(PlaybackState::Paused)
    }

    fn set_state(&mut self, new_state: PlaybackState) -> PlayResult<()> {
        match &mut self.mode {
            PlaybackMode::Continuous { state, .. } => {
                if *state != new_state {
                    info!(from = ?state, to = ?new_state, "playback state");
                    *state = new_state;
                }
                Ok(())
            }
            PlaybackMode::Discrete => Err(PlayError::configuration(
                "play/pause needs a continuous player",
            )),
        }
    }

    /// Seconds added per tick; None in discrete mode
    pub fn timer_increment(&self) -> Option<f64> {
        match self.mode {
            PlaybackMode::Continuous { tick_increment, .. } => Some(tick_increment),
            PlaybackMode::Discrete => None,
        }
    }

    pub fn set_timer_increment(&mut self, increment: f64) -> PlayResult<()> {
        if !increment.is_finite() {
            return Err(PlayError::configuration(format!(
                "timer increment must be finite, got {increment}"
            )));
        }
        match &mut self.mode {
            PlaybackMode::Continuous { tick_increment, .. } => {
                *tick_increment = increment;
                Ok(())
            }
            PlaybackMode::Discrete => Err(PlayError::configuration(
                "a discrete player has no timer",
            )),
        }
    }

    /// One timer tick: advances time while playing, otherwise does nothing.
    /// Returns whether time moved.
    pub fn tick(&mut self) -> bool {
        match self.mode {
            PlaybackMode::Continuous {
                state: PlaybackState::Playing,
                tick_increment,
            } if self.timer_armed => {
                self.set_current_time(self.current_time.advance(tick_increment));
                true
            }
            _ => false,
        }
    }

    /// Whether a [`TickTimer`](crate::playback::TickTimer) should keep driving this player
    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    // Display

    pub fn set_display_options(
        &mut self,
        update: &DisplayOptionsUpdate,
        entity_name: Option<&str>,
    ) -> PlayResult<()> {
        if let Some(overlay_type) = &update.overlay_type {
            if !self.registry.contains(overlay_type) {
                return Err(PlayError::configuration(format!(
                    "no overlay factory registered for {overlay_type}"
                )));
            }
        }
        self.store.set_display_options(entity_name, update)
    }

    pub fn get_display_options(&self, entity_name: &str) -> PlayResult<&DisplayOptions> {
        self.store
            .get(entity_name)
            .map(Entity::display_options)
            .ok_or_else(|| PlayError::configuration(format!("no entity named {entity_name:?}")))
    }

    /// Show or hide one entity, or all when `entity_name` is None. Unknown names are ignored.
    pub fn set_entity_visibility(&mut self, visible: bool, entity_name: Option<&str>) {
        self.store.set_visibility(entity_name, visible);
    }

    // Lifecycle

    pub fn entities(&self) -> &BTreeMap<String, Entity> {
        self.store.entities()
    }

    /// Release every overlay, drop all entities and disarm the timer
    pub fn clean_up(&mut self) {
        let released = self.store.entities().len();
        self.store.clear();
        self.past_end = false;
        self.timer_armed = false;
        info!(released, "cleaned up");
    }
}

impl EventEmitting for Player {
    fn event_bus(&mut self) -> &mut EventBus {
        &mut self.events
    }
}

fn build_spec(
    entity: EntityKey,
    time_field: Option<FieldRef>,
    geometry_field: Option<FieldRef>,
    display: Option<DisplayOptions>,
) -> IngestSpec {
    IngestSpec {
        entity,
        time_field: time_field.unwrap_or(FieldRef::DEFAULT_TIME),
        geometry_field: geometry_field.unwrap_or(FieldRef::DEFAULT_GEOMETRY),
        display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LatLng, OverlayType};
    use crate::events::EventType;
    use crate::overlay::{OverlayCommand, RecordingFactory};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Harness {
        player: Player,
        factory: RecordingFactory,
        events: Rc<RefCell<Vec<Event>>>,
    }

    fn harness(continuous: bool, settings: Settings) -> Harness {
        let factory = RecordingFactory::new();
        let mut registry = OverlayRegistry::new();
        registry
            .register(OverlayType::Marker, factory.clone())
            .register(OverlayType::Bubble, factory.clone());

        let surface = Surface::new("map");
        let mut player = if continuous {
            Player::continuous(surface, registry, &settings)
        } else {
            Player::discrete(surface, registry, &settings)
        };

        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventType::TimeChanged, EventType::DataReady, EventType::EndOfData] {
            let events = events.clone();
            player.add_event_listener(kind, move |ev| {
                events.borrow_mut().push(ev.clone());
                Ok(())
            });
        }

        Harness {
            player,
            factory,
            events,
        }
    }

    impl Harness {
        fn count(&self, kind: EventType) -> usize {
            self.events.borrow().iter().filter(|ev| ev.kind() == kind).count()
        }
    }

    fn track_a() -> Vec<Row> {
        vec![
            json!({"time": 0, "lat": 0, "lng": 0}),
            json!({"time": 10, "lat": 10, "lng": 10}),
        ]
    }

    fn push_track_a(player: &mut Player, display: Option<DisplayOptions>) {
        player
            .push_entity_data(
                "A",
                &track_a(),
                Some(FieldRef::from("time")),
                Some(FieldRef::lat_lng("lat", "lng")),
                display,
            )
            .unwrap();
    }

    #[test]
    fn test_two_sample_scenario() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, Some(DisplayOptions::interpolated()));

        assert_eq!(h.player.start_time(), Some(Timestamp(0.0)));
        assert_eq!(h.player.stop_time(), Some(Timestamp(10.0)));
        // The first ingestion seeks to the start, before DataReady
        assert_eq!(
            *h.events.borrow(),
            vec![Event::TimeChanged(Timestamp(0.0)), Event::DataReady]
        );

        h.player.set_current_time(Timestamp(5.0));
        let expected = LatLng::new(0.0, 0.0).interpolate(LatLng::new(10.0, 10.0), 0.5);
        let pos = h.factory.log().last_position("A").unwrap();
        assert_eq!(pos, expected);
        assert!((pos.lat - 5.0).abs() < 0.1 && (pos.lng - 5.0).abs() < 0.1);
        assert_eq!(h.count(EventType::EndOfData), 0);

        h.player.set_current_time(Timestamp(11.0));
        assert_eq!(h.count(EventType::EndOfData), 1);
        assert_eq!(h.factory.log().last_position("A"), Some(LatLng::new(10.0, 10.0)));
        assert_eq!(h.player.entities()["A"].current_index(), Some(1));
    }

    #[test]
    fn test_later_entities_get_overlays_without_moving_time() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);
        h.player.set_current_time(Timestamp(4.0));

        h.player
            .push_entity_data("B", &[json!([2, "1,1"]), json!([6, "2,2"])], None, None, None)
            .unwrap();

        let b = &h.player.entities()["B"];
        assert!(b.has_overlay());
        assert_eq!(b.current_index(), Some(1));
        assert_eq!(h.factory.created(), 2);
        assert_eq!(h.factory.log().last_position("B"), Some(LatLng::new(2.0, 2.0)));
        assert_eq!(h.player.current_time(), Timestamp(4.0));
        // A refresh, not a seek
        assert_eq!(h.count(EventType::TimeChanged), 2);
    }

    #[test]
    fn test_end_of_data_every_call() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);

        h.player.set_current_time(Timestamp(11.0));
        h.player.set_current_time(Timestamp(11.0));
        assert_eq!(h.count(EventType::EndOfData), 2);
        // Exactly at the stop time is not past it
        h.player.set_current_time(Timestamp(10.0));
        assert_eq!(h.count(EventType::EndOfData), 2);
    }

    #[test]
    fn test_end_of_data_edge_triggered() {
        let settings = Settings {
            end_of_data: EndOfDataPolicy::EdgeTriggered,
            ..Settings::default()
        };
        let mut h = harness(false, settings);
        push_track_a(&mut h.player, None);

        h.player.set_current_time(Timestamp(11.0));
        h.player.set_current_time(Timestamp(11.0));
        h.player.set_current_time(Timestamp(12.0));
        assert_eq!(h.count(EventType::EndOfData), 1);

        h.player.set_current_time(Timestamp(3.0));
        h.player.set_current_time(Timestamp(15.0));
        assert_eq!(h.count(EventType::EndOfData), 2);
    }

    #[test]
    fn test_single_sample_overlay_created_once() {
        let mut h = harness(false, Settings::default());
        h.player
            .push_entity_data("B", &[json!([4, "1,2"])], None, None, None)
            .unwrap();

        for t in [-100.0, 4.0, 4.5, 1000.0] {
            h.player.set_current_time(Timestamp(t));
            assert_eq!(h.player.entities()["B"].current_index(), Some(0));
        }
        assert_eq!(h.factory.created(), 1);
        assert_eq!(h.player.surface().attached_count(), 1);
    }

    #[test]
    fn test_failed_ingestion_emits_nothing() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);
        h.events.borrow_mut().clear();

        let err = h
            .player
            .push_entity_data("A", &[json!([20, "5,5"]), json!([null, "5,5"])], None, None, None)
            .unwrap_err();
        assert!(matches!(err, PlayError::Data { row: 1, .. }));
        assert!(h.events.borrow().is_empty());
        assert_eq!(h.player.stop_time(), Some(Timestamp(10.0)));
    }

    #[test]
    fn test_push_data_by_column() {
        let mut h = harness(false, Settings::default());
        let rows = vec![
            json!({"t": 1, "where": "0,0", "who": "bus"}),
            json!({"t": 2, "where": "1,1", "who": "tram"}),
            json!({"t": 3, "where": "2,2", "who": "bus"}),
        ];
        h.player
            .push_data(
                Some(FieldRef::from("who")),
                &rows,
                Some(FieldRef::from("t")),
                Some(FieldRef::from("where")),
                None,
            )
            .unwrap();

        let names: Vec<&String> = h.player.entities().keys().collect();
        assert_eq!(names, vec!["bus", "tram"]);
        assert_eq!(h.player.entities()["bus"].samples().len(), 2);
        assert_eq!(h.player.current_time(), Timestamp(1.0));
    }

    #[test]
    fn test_later_ingestion_keeps_current_time() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);
        h.player.set_current_time(Timestamp(7.0));

        h.player
            .push_entity_data("C", &[json!([-5, "0,0"])], None, None, None)
            .unwrap();
        assert_eq!(h.player.current_time(), Timestamp(7.0));
        assert_eq!(h.player.start_time(), Some(Timestamp(-5.0)));
        assert_eq!(h.count(EventType::DataReady), 2);
    }

    #[test]
    fn test_continuous_ticks_only_while_playing() {
        let settings = Settings {
            tick_increment: 2.0,
            ..Settings::default()
        };
        let mut h = harness(true, settings);
        push_track_a(&mut h.player, None);

        assert_eq!(h.player.state(), PlaybackState::Paused);
        assert!(!h.player.tick());
        assert_eq!(h.player.current_time(), Timestamp(0.0));

        h.player.play().unwrap();
        assert!(h.player.tick());
        assert!(h.player.tick());
        assert_eq!(h.player.current_time(), Timestamp(4.0));

        h.player.set_timer_increment(0.5).unwrap();
        assert_eq!(h.player.timer_increment(), Some(0.5));
        h.player.tick();
        assert_eq!(h.player.current_time(), Timestamp(4.5));

        h.player.pause().unwrap();
        assert!(!h.player.tick());
        assert_eq!(h.player.current_time(), Timestamp(4.5));
        assert!(h.player.status().paused);
    }

    #[test]
    fn test_discrete_has_no_timer() {
        let mut h = harness(false, Settings::default());
        assert!(matches!(h.player.play(), Err(PlayError::Configuration(_))));
        assert!(h.player.set_timer_increment(3.0).is_err());
        assert_eq!(h.player.timer_increment(), None);
        assert!(!h.player.tick());
        assert!(!h.player.timer_armed());
    }

    #[test]
    fn test_display_options_api() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);

        assert!(!h.player.get_display_options("A").unwrap().interpolated);
        assert!(matches!(
            h.player.get_display_options("Z"),
            Err(PlayError::Configuration(_))
        ));

        let unknown = DisplayOptionsUpdate::new().overlay_type(OverlayType::Heatmap);
        assert!(matches!(
            h.player.set_display_options(&unknown, Some("A")),
            Err(PlayError::Configuration(_))
        ));

        let bubble = DisplayOptionsUpdate::new().overlay_type(OverlayType::Bubble);
        h.player.set_display_options(&bubble, None).unwrap();
        assert!(!h.player.entities()["A"].has_overlay());
        h.player.set_current_time(Timestamp(1.0));
        assert_eq!(h.factory.created(), 2);
    }

    #[test]
    fn test_visibility() {
        let mut h = harness(false, Settings::default());
        push_track_a(&mut h.player, None);

        h.player.set_entity_visibility(false, None);
        h.player.set_entity_visibility(true, Some("A"));
        h.player.set_entity_visibility(false, Some("nobody"));

        let commands = h.factory.log().commands_for("A");
        assert_eq!(
            &commands[commands.len() - 2..],
            &[OverlayCommand::Hide, OverlayCommand::Show]
        );
    }

    #[test]
    fn test_clean_up() {
        let mut h = harness(true, Settings::default());
        push_track_a(&mut h.player, None);
        h.player
            .push_entity_data("B", &[json!([3, "1,1"])], None, None, None)
            .unwrap();
        h.player.set_current_time(Timestamp(5.0));
        assert_eq!(h.player.surface().attached_count(), 2);

        h.player.clean_up();
        assert!(h.player.entities().is_empty());
        assert_eq!(h.player.surface().attached_count(), 0);
        assert!(!h.player.timer_armed());

        h.player.play().unwrap();
        assert!(!h.player.tick());

        // Idempotent
        h.player.clean_up();
        assert!(h.player.entities().is_empty());
    }

    #[test]
    fn test_listener_removal() {
        let mut h = harness(false, Settings::default());
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let id = h.player.add_event_listener(EventType::TimeChanged, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        h.player.set_current_time(Timestamp(1.0));
        assert!(h.player.remove_listener(id, EventType::TimeChanged));
        h.player.set_current_time(Timestamp(2.0));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(h.count(EventType::TimeChanged), 2);
    }
}
