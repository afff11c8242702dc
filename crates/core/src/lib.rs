//! Face-anchored video stabilization.
//!
//! A landmark detector finds an eye-center anchor in each frame; the
//! [`stabilization`] state machine turns anchor motion into a translation
//! that keeps the face steady, and the [`pipeline`] wires capture, detection,
//! stabilization and output together.

pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod anchor_point;
        pub mod face_landmarks;
        pub mod landmark_detector;
    }
    pub mod infrastructure;
}

pub mod stabilization {
    pub mod domain {
        pub mod anchor_history;
        pub mod frame_warper;
        pub mod stabilizer;
        pub mod stabilizer_config;
        pub mod transform;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
        pub mod image_sequence_writer;
    }
}

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod stabilize_video_use_case;
}
